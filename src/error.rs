//! Error types for the Farrin session layer.
//!
//! These never cross the public operation boundary: the gateway, api and sync
//! layers fold them into [`ApiResponse`](crate::gateway::ApiResponse).

use std::time::Duration;

/// Top-level error type for session-layer plumbing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open session store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No identity is cached")]
    NoIdentity,

    #[error("Preferences belong to identity {found}, cached identity is {expected}")]
    IdentityMismatch { expected: i64, found: i64 },
}

/// Failures that happen before an HTTP response exists.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid request: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether the failure happened at the connection level and may be retried.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused(_) | Self::ConnectionReset(_) | Self::Network(_)
        )
    }
}

/// Result type alias for session-layer plumbing.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_level_classification() {
        assert!(TransportError::ConnectionRefused("x".into()).is_connection_level());
        assert!(TransportError::ConnectionReset("x".into()).is_connection_level());
        assert!(TransportError::Network("x".into()).is_connection_level());
        assert!(!TransportError::Timeout(Duration::from_secs(10)).is_connection_level());
        assert!(!TransportError::Request("bad url".into()).is_connection_level());
    }

    #[test]
    fn store_error_converts_into_top_level() {
        let err: Error = StoreError::NoIdentity.into();
        assert!(matches!(err, Error::Store(StoreError::NoIdentity)));
        assert_eq!(err.to_string(), "Session store error: No identity is cached");
    }
}
