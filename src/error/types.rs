//! Error types
//!
//! Request-time failures travel as [`Error`]; anything that must stop the
//! process before it serves traffic is wrapped in a [`StartupError`].

use thiserror::Error;

/// Main error type for the library
#[derive(Debug, Error)]
pub enum Error {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error in {field}: {message}")]
    Config {
        /// The configuration field that has an error
        field: String,
        /// Error message describing the issue
        message: String,
    },

    /// A nested group was requested before any top-level group existed
    #[error("No active route group to nest '{prefix}' under")]
    NoActiveGroup {
        /// Prefix of the group that could not be created
        prefix: String,
    },

    /// A trusted proxy entry is neither an IP address nor a CIDR range
    #[error("Invalid trusted proxy '{entry}': {reason}")]
    InvalidProxy {
        /// The rejected entry
        entry: String,
        /// Why it was rejected
        reason: String,
    },

    /// Listener or serve loop errors
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(field: S, message: S) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a trusted proxy error
    pub fn invalid_proxy<S: Into<String>>(entry: S, reason: S) -> Self {
        Self::InvalidProxy {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// Create a new server error
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Json(..) => "json",
            Error::Toml(..) => "toml",
            Error::Io(..) => "io",
            Error::Config { .. } => "config",
            Error::NoActiveGroup { .. } => "routing",
            Error::InvalidProxy { .. } => "proxy",
            Error::Server(..) => "server",
        }
    }
}

/// Unrecoverable failure during construction, initialization or serving.
///
/// Carries an operator-facing (usually localized) message and the error
/// that caused it. The process entry point decides how to exit.
#[derive(Debug, Error)]
#[error("{message}: {source}")]
pub struct StartupError {
    message: String,
    #[source]
    source: Error,
}

impl StartupError {
    /// Operator-facing message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Underlying cause
    pub fn cause(&self) -> &Error {
        &self.source
    }

    /// Consume and return the underlying cause
    pub fn into_cause(self) -> Error {
        self.source
    }
}

/// Report an unrecoverable failure.
///
/// Logs the message with its cause and returns the [`StartupError`] for the
/// caller to hand back to the process entry point.
pub fn fatal(message: impl Into<String>, cause: impl Into<Error>) -> StartupError {
    let error = StartupError {
        message: message.into(),
        source: cause.into(),
    };
    tracing::error!(
        details = %crate::error::format_error_for_logging(&error.source),
        "{}",
        crate::error::format_error(&error)
    );
    error
}
