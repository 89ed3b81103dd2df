//! `kanban`: command-line Kanban board.
//!
//! Talks to a running task store. Reorders go through the same optimistic
//! engine and drop resolver a graphical board would use.
//!
//! ```bash
//! # Print the board
//! cargo run --bin kanban -- list
//!
//! # Add a task and move it
//! cargo run --bin kanban -- add "Write docs" --status doing
//! cargo run --bin kanban -- mv 0190c1b2 done --index 0
//!
//! # Drop a task onto another card, or onto a column surface
//! cargo run --bin kanban -- drop 0190c1b2 --onto column:todo
//!
//! # Point at another store
//! KANBAN_STORE_URL=http://127.0.0.1:9090 cargo run --bin kanban -- ping
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_appender::non_blocking::WorkerGuard;

use kanban::board::{Board, BoardEvent, DragEnd, DropTarget};
use kanban::config::{CliArgs, ClientConfig, Command};
use kanban::render::{render_board, render_task_line};
use kanban::store::http::HttpTaskStore;
use kanban_proto::{NewTask, TaskId, TaskPatch};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file; stdout carries the board.
    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    let store = match HttpTaskStore::new(&config.store_url, config.request_timeout) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(Command::List);
    tracing::info!(store = %store.base_url(), ?command, "kanban starting");

    if command == Command::Ping {
        return if store.ping().await {
            println!("store reachable at {}", store.base_url());
            ExitCode::SUCCESS
        } else {
            println!("store unreachable at {}", store.base_url());
            ExitCode::FAILURE
        };
    }

    let board = Board::new(Arc::new(store));
    let mut events = board.subscribe();
    let result = run(&board, command).await;
    print_notices(&mut events);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("kanban.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(
    board: &Board<HttpTaskStore>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    board.refresh().await?;

    match command {
        Command::List | Command::Ping => {}
        Command::Add {
            title,
            description,
            status,
        } => {
            let mut task = NewTask::new(title);
            task.description = description;
            task.status = status;
            let created = board.create(task).await?;
            print!("created {}", render_task_line(&created));
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            let id = find_task(board, &id)?;
            let patch = TaskPatch {
                title,
                description,
                status: None,
            };
            if patch.is_empty() {
                return Err("nothing to change; pass --title or --description".into());
            }
            board.update(&id, patch).await?;
        }
        Command::Rm { id } => {
            let id = find_task(board, &id)?;
            board.delete(&id).await?;
        }
        Command::Mv { id, status, index } => {
            let id = find_task(board, &id)?;
            let index = index.unwrap_or_else(|| board.view().len(status));
            board.reorder(&id, status, index).await?;
        }
        Command::Drop { id, onto } => {
            let id = find_task(board, &id)?;
            let drag = DragEnd {
                active: id,
                origin: None,
                over: Some(drop_target(board, &onto)),
            };
            if board.handle_drag_end(&drag).await?.is_none() {
                println!("nothing to move");
            }
        }
    }

    print!("{}", render_board(&board.view()));
    Ok(())
}

/// Resolves a full id or a unique id prefix against the loaded board.
fn find_task(board: &Board<HttpTaskStore>, raw: &str) -> Result<TaskId, String> {
    let tasks = board.snapshot();
    if let Some(task) = tasks.iter().find(|t| t.id.as_str() == raw) {
        return Ok(task.id.clone());
    }
    let mut matches = tasks.iter().filter(|t| t.id.as_str().starts_with(raw));
    match (matches.next(), matches.next()) {
        (Some(task), None) if !raw.is_empty() => Ok(task.id.clone()),
        (Some(_), Some(_)) => Err(format!("task id prefix {raw:?} is ambiguous")),
        _ => Err(format!("no task with id {raw:?}")),
    }
}

/// Parses `--onto`, expanding card id prefixes the same way task ids are.
fn drop_target(board: &Board<HttpTaskStore>, onto: &str) -> DropTarget {
    match DropTarget::from_key(onto) {
        DropTarget::Card { .. } => find_task(board, onto)
            .map_or_else(|_| DropTarget::from_key(onto), DropTarget::card),
        column => column,
    }
}

fn print_notices(events: &mut broadcast::Receiver<BoardEvent>) {
    while let Ok(event) = events.try_recv() {
        if let BoardEvent::Notice(notice) = event {
            eprintln!("{notice}");
        }
    }
}
