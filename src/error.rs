use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DialError>;

#[derive(Debug, Error)]
pub enum DialError {
    #[error("dial not found")]
    DialNotFound,
    #[error("board not found")]
    BoardNotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("operation canceled")]
    Canceled,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DialError {
    /// True for the identity-matchable domain kinds, false for wrapped
    /// low-level failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::DialNotFound | Self::BoardNotFound | Self::Unauthorized
        )
    }

    /// Attaches operation context to wrapped low-level failures. Domain
    /// errors and cancellation pass through undecorated so identity
    /// matching keeps working.
    pub(crate) fn with_op(self, operation: &str, id: &str) -> Self {
        match self {
            Self::Storage(msg) => Self::Storage(format!("{operation} {id}: {msg}")),
            Self::Serialization(msg) => Self::Serialization(format!("{operation} {id}: {msg}")),
            Self::Io(err) => Self::Storage(format!("{operation} {id}: {err}")),
            other => other,
        }
    }
}

impl From<serde_json::Error> for DialError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
