// ============================================================================
// Configuration Constants
// ============================================================================

pub(crate) const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

// Liveness lock TTL of a transaction. Must exceed the worst-case time a
// worker spends on one unit of work, otherwise live work gets swept.
pub(crate) const DEFAULT_TRANSACTION_TIMEOUT_SECS: u64 = 60;

pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub(crate) const DEFAULT_KEY_NAMESPACE: &str = "rebus";

pub(crate) const DEFAULT_RUST_LOG: &str = "info";
