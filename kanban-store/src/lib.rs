//! Kanban task store library.
//!
//! Exposes the store service for use in tests and embedding. The service
//! owns the authoritative task collection (status and order included) and
//! serves it over a small REST interface.

pub mod api;
pub mod config;
pub mod store;
