//! Error types for the identity provider.

use serde_json::Value;
use thiserror::Error;
use tonio_core::{ErrorCause, Failure};

/// Errors raised by an identity provider or app.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The provider refused the email/password pair.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String, body: Option<Value> },

    /// The provider answered with a non-success status.
    #[error("Identity provider rejected the request: HTTP {status}")]
    Rejected { status: u16, body: Option<Value> },

    #[error("No user is signed in")]
    NoCurrentUser,

    #[error("Identity app has been deleted")]
    AppDeleted,

    #[error("Identity configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IdentityError {
    /// Decoded response body of a rejected request, if any.
    pub fn remote_body(&self) -> Option<&Value> {
        match self {
            IdentityError::InvalidCredentials { body, .. } | IdentityError::Rejected { body, .. } => {
                body.as_ref()
            }
            _ => None,
        }
    }

    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            IdentityError::Rejected { status, .. } => Some(*status),
            IdentityError::InvalidCredentials { .. } => Some(400),
            IdentityError::Http(error) => error.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<IdentityError> for ErrorCause {
    fn from(error: IdentityError) -> Self {
        let body = error.remote_body().cloned();
        ErrorCause::from_envelope(error, body.as_ref())
    }
}

impl From<IdentityError> for Failure {
    fn from(error: IdentityError) -> Self {
        Failure::Raw(error.into())
    }
}

/// Result type alias using IdentityError.
pub type IdentityResult<T> = Result<T, IdentityError>;
