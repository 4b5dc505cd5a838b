//! Error types for berth

use thiserror::Error;

/// Main error type for berth
#[derive(Error, Debug)]
pub enum BerthError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected before touching any state
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cluster not found
    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    /// Deployment not found
    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),

    /// A cluster's counters violate `available <= total`
    #[error("Ledger corruption: {0}")]
    LedgerCorruption(String),

    /// Backing store failed to read or write a record
    #[error("Storage error: {0}")]
    Storage(String),

    /// The write backing an admission failed and was rolled back
    #[error("Storage commit failed: {0}")]
    StorageCommit(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BerthError {
    /// Whether the error reports a record that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BerthError::ClusterNotFound(_) | BerthError::DeploymentNotFound(_)
        )
    }
}

/// Result type for berth operations
pub type BerthResult<T> = Result<T, BerthError>;

impl From<serde_json::Error> for BerthError {
    fn from(err: serde_json::Error) -> Self {
        BerthError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BerthError {
    fn from(err: toml::de::Error) -> Self {
        BerthError::Config(err.to_string())
    }
}
