// ============================================================================
// Key Layout
// ============================================================================
//
// Persisted key layout. Operations tooling reads these keys directly, so the
// shapes below are a compatibility contract:
//
//   rebus:message:counter                 global message-id counter (never namespaced)
//   {ns}:queue:{name}                     main list of message ids
//   {ns}:queue:{name}:rollback:{tx}       per-transaction rollback list
//   {ns}:queue:{name}:transactions        transaction ids registered for sweep
//   {ns}:transaction:counter              global transaction-id counter
//   {ns}:transaction:{tx}                 liveness lock (TTL-bearing)
//   {message_id}                          message envelope (optional TTL)
//
// Producers LPUSH onto the left end of a queue list; consumers pop from the
// right end, so the right end always holds the oldest surviving id.
//
// ============================================================================

pub const DEFAULT_NAMESPACE: &str = "rebus";

/// Message ids double as envelope keys, so every namespace sharing a
/// database must draw them from this one counter
pub const MESSAGE_COUNTER: &str = "rebus:message:counter";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    namespace: String,
}

impl KeyLayout {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn message_counter(&self) -> String {
        MESSAGE_COUNTER.to_string()
    }

    pub fn queue(&self, queue_name: &str) -> String {
        format!("{}:queue:{}", self.namespace, queue_name)
    }

    pub fn rollback_queue(&self, queue_name: &str, transaction_id: u64) -> String {
        format!(
            "{}:queue:{}:rollback:{}",
            self.namespace, queue_name, transaction_id
        )
    }

    pub fn transactions(&self, queue_name: &str) -> String {
        format!("{}:queue:{}:transactions", self.namespace, queue_name)
    }

    pub fn transaction_counter(&self) -> String {
        format!("{}:transaction:counter", self.namespace)
    }

    pub fn transaction_lock(&self, transaction_id: u64) -> String {
        format!("{}:transaction:{}", self.namespace, transaction_id)
    }

    /// Envelopes live under their bare id, outside the namespace
    pub fn message(&self, message_id: &str) -> String {
        message_id.to_string()
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
