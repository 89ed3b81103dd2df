//! Kanban task store server.
//!
//! An axum REST server that owns the authoritative task collection for the
//! board client.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080, persisting to ./tasks.json
//! cargo run --bin kanban-store
//!
//! # Custom address, memory-only board
//! cargo run --bin kanban-store -- --bind 127.0.0.1:9090 --no-persist
//!
//! # Or via environment variables
//! KANBAN_STORE_ADDR=127.0.0.1:9090 TASKS_JSON_PATH=/tmp/tasks.json cargo run --bin kanban-store
//! ```

use std::sync::Arc;

use clap::Parser;
use kanban_store::api;
use kanban_store::config::{StoreCliArgs, StoreConfig};
use kanban_store::store::TaskStore;

#[tokio::main]
async fn main() {
    let cli = StoreCliArgs::parse();

    let config = match StoreConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = match &config.data_file {
        Some(path) => match TaskStore::open(path) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "failed to load tasks");
                std::process::exit(1);
            }
        },
        None => TaskStore::new(),
    };

    tracing::info!(
        addr = %config.bind_addr,
        data_file = ?config.data_file,
        "starting kanban task store"
    );

    match api::start_server_with_store(&config.bind_addr, Arc::new(store), &config.allowed_origins)
        .await
    {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "task store listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task store server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start task store");
            std::process::exit(1);
        }
    }
}
