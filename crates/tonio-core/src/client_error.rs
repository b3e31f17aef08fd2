//! Uniform error representation returned from every public client operation.
//!
//! A [`ClientError`] carries a kind tag, a human-readable message, an
//! append-only list of supplementary messages, and at most one cause. The
//! cause is either another `ClientError`, a native Rust error, or a
//! structured payload lifted out of a remote error envelope.
//!
//! Whether a failure is re-raised unchanged or wrapped with a
//! case-specific message is decided by the [`Failure`] tag, never by
//! inspecting the error's type at runtime.

use serde::Serialize;
use serde_json::Value;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

/// Message used when an error is created without one.
pub const DEFAULT_ERROR_MESSAGE: &str = "Unexpected error occurred in Tonio.";

/// Named condition carried by every [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// `initialize` called on an initialized client.
    AlreadyInitialized,
    /// Operation requires an initialized client.
    NotInitialized,
    /// Operation requires a signed-in user.
    NotAuthenticated,
    /// The captioning service URL is not configured.
    MissingServiceUrl,
    /// The identity provider or captioning backend failed.
    Remote,
    /// No specific condition.
    Unexpected,
}

/// Coarse grouping of [`ErrorKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller misuse of the session state machine.
    Lifecycle,
    /// Misconfiguration detected before any remote call.
    Validation,
    /// Failure reported by a remote collaborator.
    Remote,
    Unexpected,
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::AlreadyInitialized
            | ErrorKind::NotInitialized
            | ErrorKind::NotAuthenticated => ErrorCategory::Lifecycle,
            ErrorKind::MissingServiceUrl => ErrorCategory::Validation,
            ErrorKind::Remote => ErrorCategory::Remote,
            ErrorKind::Unexpected => ErrorCategory::Unexpected,
        }
    }
}

/// What caused a [`ClientError`].
#[derive(Debug)]
pub enum ErrorCause {
    /// Another wrapped error.
    Wrapped(Box<ClientError>),
    /// A native error from a collaborator or library.
    Native(Box<dyn StdError + Send + Sync + 'static>),
    /// The `error` payload lifted out of a remote response envelope.
    Remote(Value),
}

impl ErrorCause {
    /// Record a native error as-is.
    pub fn native<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ErrorCause::Native(Box::new(error))
    }

    /// Record `error`, unless `body` is a remote envelope with an `error`
    /// field, in which case that payload is recorded instead.
    pub fn from_envelope<E>(error: E, body: Option<&Value>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        match body.and_then(|b| b.get("error")) {
            Some(payload) if !payload.is_null() => ErrorCause::Remote(payload.clone()),
            _ => ErrorCause::native(error),
        }
    }

    fn to_transport_value(&self) -> Value {
        match self {
            ErrorCause::Wrapped(inner) => serde_json::to_value(inner.to_transport_object())
                .unwrap_or(Value::Null),
            ErrorCause::Native(error) => serde_json::json!({ "message": error.to_string() }),
            ErrorCause::Remote(payload) => payload.clone(),
        }
    }
}

impl From<ClientError> for ErrorCause {
    fn from(error: ClientError) -> Self {
        ErrorCause::Wrapped(Box::new(error))
    }
}

impl From<serde_json::Error> for ErrorCause {
    fn from(error: serde_json::Error) -> Self {
        ErrorCause::native(error)
    }
}

impl From<std::io::Error> for ErrorCause {
    fn from(error: std::io::Error) -> Self {
        ErrorCause::native(error)
    }
}

/// Serializable snapshot of a [`ClientError`] for crossing a process
/// boundary (for example as an HTTP response body).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportObject {
    pub message: String,
    pub stack_trace: String,
    pub inner_error: Value,
    pub errors: Vec<String>,
}

/// The error returned by every public client operation.
#[derive(Debug)]
pub struct ClientError {
    kind: ErrorKind,
    message: String,
    supplementary: Vec<String>,
    cause: Option<ErrorCause>,
    backtrace: Backtrace,
}

impl ClientError {
    /// Create an error. An empty message becomes [`DEFAULT_ERROR_MESSAGE`].
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            message
        };

        Self {
            kind,
            message,
            supplementary: Vec::new(),
            cause: None,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn already_initialized() -> Self {
        Self::new(ErrorKind::AlreadyInitialized, "Tonio is already initialized.")
            .with_supplementary("Tonio should be initialized only once.")
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorKind::NotInitialized,
            "Please, initialize for using Tonio first.",
        )
        .with_supplementary("You haven't initialized Tonio.")
    }

    pub fn not_authenticated() -> Self {
        Self::new(ErrorKind::NotAuthenticated, "Please, sign in before using Tonio.")
            .with_supplementary("You are not authenticated.")
    }

    pub fn missing_service_url() -> Self {
        Self::new(
            ErrorKind::MissingServiceUrl,
            "Incorrect Tonio service configuration.",
        )
        .with_supplementary("Tonio service url is not defined.")
    }

    /// Append a supplementary message, ignoring empty strings.
    pub fn add_supplementary(&mut self, note: impl Into<String>) -> &mut Self {
        let note = note.into();
        if !note.is_empty() {
            self.supplementary.push(note);
        }
        self
    }

    /// Builder form of [`add_supplementary`](Self::add_supplementary).
    pub fn with_supplementary(mut self, note: impl Into<String>) -> Self {
        self.add_supplementary(note);
        self
    }

    /// Record the cause. Only the first assignment is kept.
    pub fn caused_by(mut self, cause: impl Into<ErrorCause>) -> Self {
        if self.cause.is_none() {
            self.cause = Some(cause.into());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Supplementary messages in insertion order.
    pub fn supplementary(&self) -> &[String] {
        &self.supplementary
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    /// This error's trace, followed by its cause's trace when the cause is
    /// an error rather than a remote payload.
    pub fn stack_trace(&self) -> String {
        let mut trace = format!(
            "Stack trace: {:?}: {}\n{}\n",
            self.kind, self.message, self.backtrace
        );

        match &self.cause {
            Some(ErrorCause::Wrapped(inner)) => {
                trace.push_str("Caused by ");
                trace.push_str(&inner.stack_trace());
            }
            Some(ErrorCause::Native(error)) => {
                trace.push_str(&format!("Caused by {}\n", error));
                let mut source = error.source();
                while let Some(next) = source {
                    trace.push_str(&format!("Caused by {}\n", next));
                    source = next.source();
                }
            }
            Some(ErrorCause::Remote(_)) | None => {}
        }

        trace
    }

    /// Serializable snapshot of this error.
    pub fn to_transport_object(&self) -> TransportObject {
        TransportObject {
            message: self.message.clone(),
            stack_trace: self.stack_trace(),
            inner_error: self
                .cause
                .as_ref()
                .map(ErrorCause::to_transport_value)
                .unwrap_or(Value::Null),
            errors: self.supplementary.clone(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.cause {
            Some(ErrorCause::Wrapped(inner)) => Some(inner.as_ref()),
            Some(ErrorCause::Native(error)) => Some(error.as_ref()),
            Some(ErrorCause::Remote(_)) | None => None,
        }
    }
}

/// Outcome of a failed step inside a client operation.
///
/// `Wrapped` failures already carry their final message and pass through
/// untouched. `Raw` failures get wrapped with the operation's message.
#[derive(Debug)]
pub enum Failure {
    Wrapped(ClientError),
    Raw(ErrorCause),
}

impl Failure {
    pub fn raw(cause: impl Into<ErrorCause>) -> Self {
        Failure::Raw(cause.into())
    }

    /// Resolve into the error surfaced to the caller.
    pub fn into_client_error(self, message: &str) -> ClientError {
        match self {
            Failure::Wrapped(error) => error,
            Failure::Raw(cause) => ClientError::new(ErrorKind::Remote, message).caused_by(cause),
        }
    }
}

impl From<ClientError> for Failure {
    fn from(error: ClientError) -> Self {
        Failure::Wrapped(error)
    }
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;
