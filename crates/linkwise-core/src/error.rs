//! Error types for Linkwise.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that only fail the current stage; the fallback chain moves on.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::RateLimited(_) | Self::Timeout(_) | Self::Parse(_)
        )
    }

    /// Errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
