//! Kanban board client library.
//!
//! The [`board::Board`] owns the flat task collection and applies reorders
//! optimistically, reconciling with a [`store::TaskStoreClient`] afterwards.

pub mod board;
pub mod config;
pub mod render;
pub mod store;
