//! Core types, configuration, and utilities for the Tonio captions client.

mod client_error;
mod config;
mod error;
mod logging;
mod paths;

pub use client_error::{
    ClientError, ClientResult, ErrorCategory, ErrorCause, ErrorKind, Failure, TransportObject,
    DEFAULT_ERROR_MESSAGE,
};
pub use config::{
    Config, IdentityConfig, DEFAULT_AUTH_URL, DEFAULT_LOG_LEVEL, DEFAULT_SERVICE_URL,
    DEFAULT_TOKEN_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level, ClientLogger, LogSink, TracingSink};
pub use paths::Paths;
