//! Errors raised while locating, reading or writing the client's local
//! configuration under the Tonio home directory.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting needed right now is absent from both `config.json` and
    /// the `TONIO_*` environment.
    #[error("{0} is not set (add it to config.json or the environment)")]
    MissingSetting(&'static str),

    /// `service_url` is present but not an absolute URL.
    #[error("Invalid service_url: {0}")]
    InvalidServiceUrl(#[from] url::ParseError),

    /// `config.json` exists but does not parse.
    #[error("Malformed config file {}: {source}", .path.display())]
    MalformedConfig {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Encoding the config for `save`.
    #[error("Could not encode config: {0}")]
    Encode(#[from] serde_json::Error),

    /// No home directory to place `~/.tonio` under; pass a base dir instead.
    #[error("Could not determine home directory for the Tonio base dir")]
    NoHomeDir,

    /// Reading the config, creating the base or log dirs, or opening log files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
