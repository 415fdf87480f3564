use thiserror::Error;
use uuid::Uuid;

/// Main error type for ownership transfers
#[derive(Error, Debug)]
pub enum TransferError {
    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(
        "Old owner set does not match current ownership of property {property_id}: \
         not current owners {unexpected:?}, missing current owners {missing:?}"
    )]
    OwnerSetMismatch {
        property_id: Uuid,
        unexpected: Vec<Uuid>,
        missing: Vec<Uuid>,
    },

    // Lookup / state errors
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Swap transaction rolled back
    #[error("Transaction rolled back: {0}")]
    Transaction(String),

    // Retryable store errors
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for TransferError
pub type Result<T> = std::result::Result<T, TransferError>;

impl TransferError {
    /// Whether the caller may safely retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::TransientIo(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TransferError::Validation(_) | TransferError::OwnerSetMismatch { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, TransferError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransferError::NotFound(_))
    }

    /// Short machine-readable code, used in CLI error output
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) | TransferError::OwnerSetMismatch { .. } => "validation",
            TransferError::Conflict(_) => "conflict",
            TransferError::NotFound(_) => "not_found",
            TransferError::Transaction(_) => "transaction",
            TransferError::TransientIo(_) => "transient_io",
            TransferError::Database(_) | TransferError::Migration(_) => "database",
            TransferError::Config(_) => "config",
            TransferError::Json(_) => "json",
            TransferError::Io(_) => "io",
        }
    }
}

// SQLSTATE codes postgres uses for aborted-but-retryable transactions
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for TransferError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => TransferError::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => TransferError::TransientIo(err.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                if matches!(
                    code.as_deref(),
                    Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
                ) {
                    TransferError::TransientIo(db_err.message().to_string())
                } else if db_err.is_unique_violation() {
                    TransferError::Conflict(db_err.message().to_string())
                } else {
                    TransferError::Database(db_err.message().to_string())
                }
            }
            _ => TransferError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(TransferError::TransientIo("timeout".into()).is_retryable());
        assert!(!TransferError::Conflict("pending".into()).is_retryable());
        assert!(!TransferError::Transaction("rolled back".into()).is_retryable());
    }

    #[test]
    fn test_pool_timeout_maps_to_transient() {
        let err: TransferError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());
        assert_eq!(err.code(), "transient_io");
    }

    #[test]
    fn test_mismatch_message_names_both_directions() {
        let extra = Uuid::new_v4();
        let missing = Uuid::new_v4();
        let err = TransferError::OwnerSetMismatch {
            property_id: Uuid::nil(),
            unexpected: vec![extra],
            missing: vec![missing],
        };
        let msg = err.to_string();
        assert!(msg.contains(&extra.to_string()));
        assert!(msg.contains(&missing.to_string()));
        assert!(err.is_validation());
    }
}
