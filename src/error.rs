//! Error types for the query console.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for query console operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    /// Network or HTTP transport failures (unreachable host, broken connection, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request was aborted on the client side before it settled.
    #[error("Request cancelled")]
    Cancelled,

    /// The REST API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Configuration errors (invalid config file, bad URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced worksheet, tab or connection does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal errors (unexpected states, malformed responses, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates an API error for the given HTTP status.
    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: msg.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a not-found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true for failures that happened on the wire, including client aborts.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Cancelled | Self::Api { .. })
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "Transport Error",
            Self::Cancelled => "Cancelled",
            Self::Api { .. } => "API Error",
            Self::Config(_) => "Configuration Error",
            Self::NotFound(_) => "Not Found",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using ConsoleError.
pub type Result<T> = std::result::Result<T, ConsoleError>;
