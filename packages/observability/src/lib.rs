//! # Observability
//!
//! Structured logging for the Tonio captions client.
//!
//! Library crates are **log producers** only. They emit standard `tracing`
//! events and never decide where those events end up. The embedding
//! application calls [`init_with_config`] once at startup, which installs:
//!
//! - a JSONL layer writing one record per line to a rotating log file
//!   (`~/.tonio/logs/tonio-YYYY-MM-DD.log` by default)
//! - an optional compact stderr layer for foreground use
//!
//! Files roll over at UTC midnight and whenever the active file would grow
//! past [`LogConfig::max_file_size`]. Only the newest [`LogConfig::max_files`]
//! days are kept.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() -> std::io::Result<()> {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "tonio-cli".into(),
//!         default_level: "info".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     })?;
//!
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

mod json_layer;
mod rotating;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogRecord};
pub use rotating::RotatingLogWriter;

/// Default size at which the active log file rolls over (20 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Default number of days of log files to keep.
pub const DEFAULT_MAX_FILES: usize = 7;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the emitting service, written into every record.
    pub service_name: String,

    /// Default level filter (e.g. "error", "info", "debug").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Directory holding the rotated files. Defaults to `~/.tonio/logs`.
    pub log_dir: Option<PathBuf>,

    /// File name prefix; files are named `<prefix>-YYYY-MM-DD.log`.
    pub file_prefix: String,

    /// Size in bytes after which the active file rolls over.
    pub max_file_size: u64,

    /// Days of log files to keep. Zero keeps everything.
    pub max_files: usize,

    /// Also emit human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "tonio".into(),
            default_level: "error".into(),
            log_dir: None,
            file_prefix: "tonio".into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            also_stderr: false,
        }
    }
}

fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".tonio").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with custom configuration.
///
/// Fails if the log directory cannot be created or the active log file
/// cannot be opened. Installing a second global subscriber is ignored.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let log_dir = config.log_dir.clone().unwrap_or_else(default_log_dir);

    let writer = RotatingLogWriter::new(
        &log_dir,
        &config.file_prefix,
        config.max_file_size,
        config.max_files,
    )?;

    let json_layer = JsonLayer::new(config.service_name.clone(), writer);

    let stderr_layer = if config.also_stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter(&config.default_level)))
        .with(stderr_layer)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(
            log_dir = %log_dir.display(),
            service = %config.service_name,
            "observability initialized"
        );
    }

    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub use tracing::{debug, error, info, instrument, trace, warn, Level};
