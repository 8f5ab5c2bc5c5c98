//! Server error types

use thiserror::Error;

/// Main server error type
#[derive(Debug, Error)]
pub enum ServerError {
    // ========== Infrastructure Errors ==========
    /// Broker, lock service or storage unreachable
    #[error("transient infrastructure error: {0}")]
    TransientInfra(String),

    // ========== Ledger Errors ==========
    /// Missing genesis, or a height/hash conflict on write
    #[error("chain integrity error: {0}")]
    ChainIntegrity(String),

    // ========== Validation Errors ==========
    /// Input rejected for this cycle (empty rollup, unknown anchor, bad proof)
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid hex or hash length
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    // ========== Computation Errors ==========
    /// Tree build or signature failure
    #[error("computation error: {0}")]
    Computation(String),

    /// Tree built with zero leaves
    #[error("cannot build a Merkle tree with no leaves")]
    EmptyTree,

    /// Leaf index out of bounds
    #[error("leaf index {index} out of bounds for tree with {leaf_count} leaves")]
    LeafIndexOutOfBounds { index: usize, leaf_count: usize },

    // ========== Storage Errors ==========
    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(StorageError),

    // ========== Server Errors ==========
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Data corruption detected
    #[error("data corruption: {0}")]
    Corruption(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Server result type alias
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// Get error code for logs and downstream messages
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::TransientInfra(_) => "TRANSIENT_INFRA",
            ServerError::ChainIntegrity(_) => "CHAIN_INTEGRITY",
            ServerError::Validation(_) => "VALIDATION",
            ServerError::InvalidHash(_) => "INVALID_HASH",
            ServerError::Computation(_) => "COMPUTATION",
            ServerError::EmptyTree => "EMPTY_TREE",
            ServerError::LeafIndexOutOfBounds { .. } => "INDEX_OUT_OF_BOUNDS",
            ServerError::Storage(_) => "STORAGE_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if error is recoverable (the same work can be retried later)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ServerError::TransientInfra(_)
                | ServerError::ChainIntegrity(_)
                | ServerError::Storage(StorageError::ConnectionFailed(_))
                | ServerError::Storage(StorageError::Io(_))
        )
    }

    /// Whether an inbound delivery that failed with this error should go back to the broker
    ///
    /// Validation failures are poison: redelivering them cannot succeed.
    pub fn should_redeliver(&self) -> bool {
        !matches!(
            self,
            ServerError::Validation(_) | ServerError::InvalidHash(_)
        )
    }
}

// Conversions from external errors

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        ServerError::Validation(e.to_string())
    }
}

impl From<hex::FromHexError> for ServerError {
    fn from(e: hex::FromHexError) -> Self {
        ServerError::InvalidHash(e.to_string())
    }
}

impl From<base64::DecodeError> for ServerError {
    fn from(e: base64::DecodeError) -> Self {
        ServerError::Validation(format!("base64 decode: {}", e))
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                rusqlite::ErrorCode::ConstraintViolation => {
                    ServerError::ChainIntegrity(format!("constraint violation: {}", e))
                }
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    ServerError::TransientInfra(format!("database busy: {}", e))
                }
                _ => ServerError::Storage(StorageError::Sqlite(e)),
            },
            _ => ServerError::Storage(StorageError::Sqlite(e)),
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Sqlite(inner) => inner.into(),
            other => ServerError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ServerError::ChainIntegrity("x".into()).error_code(),
            "CHAIN_INTEGRITY"
        );
        assert_eq!(ServerError::EmptyTree.error_code(), "EMPTY_TREE");
        assert_eq!(
            ServerError::LeafIndexOutOfBounds {
                index: 3,
                leaf_count: 2
            }
            .error_code(),
            "INDEX_OUT_OF_BOUNDS"
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(ServerError::TransientInfra("broker down".into()).is_recoverable());
        assert!(ServerError::ChainIntegrity("height taken".into()).is_recoverable());
        assert!(!ServerError::Validation("no blocks".into()).is_recoverable());
        assert!(!ServerError::Computation("sign".into()).is_recoverable());
    }

    #[test]
    fn test_should_redeliver() {
        assert!(ServerError::TransientInfra("x".into()).should_redeliver());
        assert!(ServerError::ChainIntegrity("x".into()).should_redeliver());
        assert!(!ServerError::Validation("unknown anchor".into()).should_redeliver());
        assert!(!ServerError::InvalidHash("zz".into()).should_redeliver());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServerError>();
    }

    #[test]
    fn test_hex_error_conversion() {
        let hex_err = hex::decode("invalid_hex").unwrap_err();
        let server_err: ServerError = hex_err.into();
        assert!(matches!(server_err, ServerError::InvalidHash(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let server_err: ServerError = json_err.into();
        assert!(matches!(server_err, ServerError::Validation(_)));
    }

    #[test]
    fn test_rusqlite_generic_error_conversion() {
        let server_err: ServerError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(
            server_err,
            ServerError::Storage(StorageError::Sqlite(_))
        ));
    }

    #[test]
    fn test_rusqlite_unique_violation_maps_to_chain_integrity() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1);")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES (1)", []).unwrap_err();
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::ChainIntegrity(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ServerError::Validation("zero cal blocks".into()).to_string(),
            "validation error: zero cal blocks"
        );
        assert_eq!(
            ServerError::EmptyTree.to_string(),
            "cannot build a Merkle tree with no leaves"
        );
        assert_eq!(
            StorageError::Corruption("bad row".into()).to_string(),
            "data corruption: bad row"
        );
    }
}
