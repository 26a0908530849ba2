//! Error types for adserver-state

use thiserror::Error;

/// Errors returned by ad server collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A referenced object does not exist on the ad server
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Creation was attempted for a name that already exists
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// The ad server could not be reached or timed out
    #[error("Ad server unavailable: {0}")]
    Unavailable(String),

    /// The ad server rejected the request payload
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Rejected(err.to_string())
    }
}
