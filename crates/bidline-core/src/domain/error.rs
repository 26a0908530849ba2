//! Error taxonomy for line item setup.

use adserver_state::ServiceError;

/// Errors that abort a setup run.
///
/// Every variant is fail-fast: the run stops at the first error and nothing
/// further is created on the ad server.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid price range: {0}")]
    InvalidRange(String),

    #[error("unresolvable targeting name '{name}': {source}")]
    UnresolvableName {
        name: String,
        #[source]
        source: ServiceError,
    },

    #[error("unsupported targeting operator: {0} (expected IS or IS_NOT)")]
    UnsupportedOperator(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("ad server error: {0}")]
    Service(#[from] ServiceError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SetupError {
    pub fn config(msg: impl Into<String>) -> Self {
        SetupError::Configuration(msg.into())
    }

    pub fn range(msg: impl Into<String>) -> Self {
        SetupError::InvalidRange(msg.into())
    }
}

/// Result type for setup operations.
pub type Result<T> = std::result::Result<T, SetupError>;
