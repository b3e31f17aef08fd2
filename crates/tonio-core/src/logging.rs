//! Client-side log sink and logging initialization.
//!
//! The client never writes log files itself. It reports through a
//! [`ClientLogger`], which filters by a runtime-adjustable level and
//! forwards to an optional [`LogSink`]. The default sink emits `tracing`
//! events, so whatever subscriber the application installed (usually the
//! rotating JSONL writer from `observability`) receives them.

use crate::{Config, CoreResult, Paths};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::Level;

/// Destination for client log messages. Implementations must not fail.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str, detail: Option<&Value>);
}

/// Sink that forwards to `tracing` under the `tonio` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str, detail: Option<&Value>) {
        let detail = detail.map(Value::to_string);
        let detail = detail.as_deref();

        match level {
            Level::ERROR => tracing::error!(target: "tonio", detail, "{}", message),
            Level::WARN => tracing::warn!(target: "tonio", detail, "{}", message),
            Level::INFO => tracing::info!(target: "tonio", detail, "{}", message),
            Level::DEBUG => tracing::debug!(target: "tonio", detail, "{}", message),
            _ => tracing::trace!(target: "tonio", detail, "{}", message),
        }
    }
}

/// Level-filtered front for a replaceable [`LogSink`].
///
/// With no sink configured every call is a no-op.
pub struct ClientLogger {
    sink: RwLock<Option<Arc<dyn LogSink>>>,
    level: RwLock<Level>,
}

impl ClientLogger {
    pub fn new(sink: Option<Arc<dyn LogSink>>, level: Level) -> Self {
        Self {
            sink: RwLock::new(sink),
            level: RwLock::new(level),
        }
    }

    /// Logger with no sink; discards everything.
    pub fn disabled() -> Self {
        Self::new(None, Level::ERROR)
    }

    pub fn level(&self) -> Level {
        *self.level.read()
    }

    /// Messages less severe than `level` are dropped from now on.
    pub fn set_level(&self, level: Level) {
        *self.level.write() = level;
    }

    /// Replace the sink. `None` silences the logger.
    pub fn set_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        *self.sink.write() = sink;
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }

    pub fn info(&self, message: &str, detail: Option<&Value>) {
        self.emit(Level::INFO, message, detail);
    }

    pub fn warn(&self, message: &str, detail: Option<&Value>) {
        self.emit(Level::WARN, message, detail);
    }

    pub fn error(&self, message: &str, detail: Option<&Value>) {
        self.emit(Level::ERROR, message, detail);
    }

    fn emit(&self, level: Level, message: &str, detail: Option<&Value>) {
        // tracing orders levels by verbosity: ERROR < WARN < ... < TRACE
        if level > self.level() {
            return;
        }
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink.log(level, message, detail);
        }
    }
}

impl Default for ClientLogger {
    fn default() -> Self {
        Self::new(Some(Arc::new(TracingSink)), Level::INFO)
    }
}

impl std::fmt::Debug for ClientLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLogger")
            .field("level", &self.level())
            .field("has_sink", &self.has_sink())
            .finish()
    }
}

/// Install the rotating JSONL subscriber for an application.
///
/// Logs go to `paths.logs_dir()` at `config.log_level`, unless `RUST_LOG`
/// overrides it.
pub fn init_logging(
    service_name: &str,
    config: &Config,
    paths: &Paths,
    also_stderr: bool,
) -> CoreResult<()> {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: config.log_level.clone(),
        log_dir: Some(paths.logs_dir()),
        also_stderr,
        ..Default::default()
    })?;
    Ok(())
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
