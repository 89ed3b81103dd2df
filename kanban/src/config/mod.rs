//! Configuration system for the `kanban` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/kanban/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use kanban_proto::Status;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    store: StoreFileConfig,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
}

/// `[store]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    url: Option<String>,
    request_timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the task store.
    pub store_url: String,
    /// Per-request timeout; `None` waits for as long as the store takes.
    pub request_timeout: Option<Duration>,
    /// Log level filter string.
    pub log_level: String,
    /// Log file path; `None` means `$TMPDIR/kanban.log`.
    pub log_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: "http://localhost:8080".to_string(),
            request_timeout: None,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or any config file cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            store_url: cli
                .store_url
                .clone()
                .or_else(|| file.store.url.clone())
                .unwrap_or(defaults.store_url),
            request_timeout: cli
                .request_timeout_ms
                .or(file.store.request_timeout_ms)
                .map(Duration::from_millis),
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.log_level.clone())
                .unwrap_or(defaults.log_level),
            log_file: cli.log_file.clone().or_else(|| file.log_file.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Kanban board client")]
pub struct CliArgs {
    /// Base URL of the task store.
    #[arg(long, env = "KANBAN_STORE_URL")]
    pub store_url: Option<String>,

    /// Per-request timeout in milliseconds (default: none).
    #[arg(long, env = "KANBAN_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Path to config file (default: `~/.config/kanban/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "KANBAN_LOG")]
    pub log_level: Option<String>,

    /// Path to log file (default: `$TMPDIR/kanban.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Board commands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the board.
    List,
    /// Create a task.
    Add {
        /// Task title.
        title: String,
        /// Task description.
        #[arg(short, long)]
        description: Option<String>,
        /// Column to create the task in.
        #[arg(short, long, value_parser = parse_status)]
        status: Option<Status>,
    },
    /// Change a task's title or description.
    Edit {
        /// Task id.
        id: String,
        /// New title.
        #[arg(short, long)]
        title: Option<String>,
        /// New description (empty clears it).
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a task.
    Rm {
        /// Task id.
        id: String,
    },
    /// Move a task to a column position.
    Mv {
        /// Task id.
        id: String,
        /// Destination column (todo, doing, done).
        #[arg(value_parser = parse_status)]
        status: Status,
        /// 0-based position in the column (default: bottom).
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Drop a task onto a card or a column, as a drag gesture would.
    Drop {
        /// Task id.
        id: String,
        /// Card id, or `column:<status>` for a column surface.
        #[arg(long)]
        onto: String,
    },
    /// Check whether the store is reachable.
    Ping,
}

fn parse_status(raw: &str) -> Result<Status, String> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|e: kanban_proto::UnknownStatus| e.to_string())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("kanban").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
