//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sync coordination
#[derive(Error, Debug)]
pub enum Error {
    #[error("Subscription error: {message}")]
    Subscription { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Generic error: {0}")]
    Generic(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create a subscription wiring error
    pub fn subscription<S: Into<String>>(message: S) -> Self {
        Self::Subscription {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into().into())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string().into())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Generic(s.into())
    }
}
