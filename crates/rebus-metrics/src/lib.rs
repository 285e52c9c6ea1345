//! Prometheus metrics for the rebus transport
//!
//! Counters cover the life of a message and of a transaction:
//! - Messages sent and received (immediate vs transactional)
//! - Transactions begun, committed, rolled back and abandoned
//! - Sweep recoveries of abandoned transactions

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    opts, register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

// ============================================================================
// Message Metrics
// ============================================================================

/// Messages handed to the store, by mode ("immediate" or "deferred")
pub static MESSAGES_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "rebus_messages_sent_total",
            "Messages enqueued directly or deferred to a transaction commit"
        ),
        &["mode"]
    )
    .expect("Failed to register MESSAGES_SENT_TOTAL metric")
});

/// Messages returned to callers, by mode ("direct" or "transactional")
pub static MESSAGES_RECEIVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "rebus_messages_received_total",
            "Messages received from a queue"
        ),
        &["mode"]
    )
    .expect("Failed to register MESSAGES_RECEIVED_TOTAL metric")
});

/// Queue slots whose body had already expired when they were popped
pub static EXPIRED_MESSAGES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "rebus_expired_messages_total",
        "Message ids popped after their body had expired"
    ))
    .expect("Failed to register EXPIRED_MESSAGES_TOTAL metric")
});

// ============================================================================
// Transaction Metrics
// ============================================================================

/// Transactions by outcome ("begun", "committed", "rolled_back", "abandoned")
pub static TRANSACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "rebus_transactions_total",
            "Transactions by lifecycle event"
        ),
        &["event"]
    )
    .expect("Failed to register TRANSACTIONS_TOTAL metric")
});

// ============================================================================
// Sweep Metrics
// ============================================================================

/// Dead transactions whose rollback queues were drained by a sweep
pub static SWEPT_TRANSACTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "rebus_swept_transactions_total",
        "Dead transactions reclaimed by a sweep"
    ))
    .expect("Failed to register SWEPT_TRANSACTIONS_TOTAL metric")
});

/// Message ids returned to their main queue by a sweep
pub static RECOVERED_MESSAGES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "rebus_recovered_messages_total",
        "Message ids moved back to their queue from dead transactions"
    ))
    .expect("Failed to register RECOVERED_MESSAGES_TOTAL metric")
});

// ============================================================================
// Metrics Collection
// ============================================================================

/// Gather all registered metrics and encode as Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
