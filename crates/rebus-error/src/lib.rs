use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

/// Transport error type
///
/// Covers everything that can go wrong between the caller and the store:
/// connectivity, envelope encoding, configuration and misuse of the
/// transaction lifecycle. A missing message body is NOT an error; it is
/// reported as an empty receive by the transport itself.
#[derive(Error, Debug)]
pub enum TransportError {
    // ===== Store Errors =====
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The store could not be reached while constructing the transport
    #[error("Connection error: {0}")]
    Connection(String),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Config(String),

    // ===== Transaction Lifecycle Errors =====
    #[error("Transaction context is not transactional")]
    NotTransactional,

    /// The liveness lock vanished before commit; the transaction is abandoned
    /// and its received messages will be returned to the queue by a sweep
    #[error("Transaction {transaction_id} expired before it could commit")]
    TransactionExpired { transaction_id: u64 },

    /// A commit or rollback was requested for a transaction that already finished
    #[error("Transaction {transaction_id} is already {state}")]
    TransactionCompleted { transaction_id: u64, state: String },

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl TransportError {
    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::Redis(_) => "REDIS_ERROR",
            TransportError::Connection(_) => "CONNECTION_ERROR",
            TransportError::Serialization(_) => "SERIALIZATION_ERROR",
            TransportError::Deserialization(_) => "DESERIALIZATION_ERROR",
            TransportError::Config(_) => "CONFIG_ERROR",
            TransportError::NotTransactional => "NOT_TRANSACTIONAL",
            TransportError::TransactionExpired { .. } => "TRANSACTION_EXPIRED",
            TransportError::TransactionCompleted { .. } => "TRANSACTION_COMPLETED",
            TransportError::Internal(_) => "INTERNAL_ERROR",
            TransportError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// True for failures of the store or the network, as opposed to
    /// programming errors and corrupt data
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            TransportError::Redis(_) | TransportError::Connection(_)
        )
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let code = self.error_code();

        match self {
            TransportError::TransactionExpired { transaction_id } => {
                tracing::warn!(
                    error = %self,
                    error_code = %code,
                    transaction_id = *transaction_id,
                    "Transaction abandoned before commit"
                );
            }
            TransportError::NotTransactional | TransportError::TransactionCompleted { .. } => {
                tracing::debug!(
                    error = %self,
                    error_code = %code,
                    "Transaction misuse"
                );
            }
            _ => {
                tracing::error!(
                    error = %self,
                    error_code = %code,
                    "Transport error occurred"
                );
            }
        }
    }
}

// ============================================================================
// Helper functions for creating common errors
// ============================================================================

impl TransportError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        TransportError::Connection(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        TransportError::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        TransportError::Internal(msg.into())
    }
}
