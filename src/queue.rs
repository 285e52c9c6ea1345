// ============================================================================
// Redis Message Queue - transactional point-to-point transport
// ============================================================================
//
// Message Lifecycle:
// 1. Send            → envelope stored under a fresh id, id pushed onto the queue
//                      (on commit, when the send happens inside a transaction)
// 2. Direct receive  → id popped and envelope deleted in one step
// 3. Tx receive      → id moved into the transaction's rollback queue
// 4. Commit          → envelope deleted, id dropped from the rollback queue
// 5. Rollback        → id moved back to the front of the queue
// 6. Crash           → lock expires; the next receive sweeps the id back
//
// Delivery is at-least-once. Ordering is FIFO for a single consumer that
// never rolls back.
//
// ============================================================================

pub(crate) mod connection;
pub mod rollback_log;
pub mod storage;
pub mod sweep;

pub use storage::ExecutionTarget;
pub use sweep::SweepReport;

use crate::context::TransactionContext;
use crate::inspect::QueueInspector;
use crate::keys::KeyLayout;
use crate::transaction::{Phase, Transaction};
use rebus_config::Config;
use rebus_error::{TransportError, TransportResult};
use rebus_store::RedisClient;
use rebus_types::{ReceivedMessage, SendRequest, TransportMessage};
use std::time::Duration;

/// One endpoint's view of the store: sends to any queue, receives from its
/// input queue
#[derive(Clone)]
pub struct RedisMessageQueue {
    client: RedisClient,
    input_queue: String,
    keys: KeyLayout,
    transaction_timeout: Duration,
}

impl RedisMessageQueue {
    pub async fn connect(config: &Config) -> TransportResult<Self> {
        config
            .validate()
            .map_err(|e| TransportError::config(e.to_string()))?;

        let client = connection::connect(&config.redis).await?;
        tracing::info!(
            queue = %config.input_queue,
            namespace = %config.redis.key_namespace,
            transaction_timeout_secs = config.transaction_timeout_secs,
            "Message queue ready"
        );

        Ok(Self::new(
            client,
            config.input_queue.clone(),
            KeyLayout::new(config.redis.key_namespace.clone()),
            config.transaction_timeout(),
        ))
    }

    pub fn new(
        client: RedisClient,
        input_queue: impl Into<String>,
        keys: KeyLayout,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            client,
            input_queue: input_queue.into(),
            keys,
            transaction_timeout,
        }
    }

    pub fn input_queue(&self) -> &str {
        &self.input_queue
    }

    /// Store key of the input queue's list
    pub fn input_queue_address(&self) -> String {
        self.keys.queue(&self.input_queue)
    }

    pub fn keys(&self) -> &KeyLayout {
        &self.keys
    }

    pub fn transaction_timeout(&self) -> Duration {
        self.transaction_timeout
    }

    /// Send to `destination`. Inside a transactional context the message
    /// becomes visible only when that context commits.
    pub async fn send(
        &mut self,
        destination: &str,
        request: &SendRequest,
        ctx: &mut dyn TransactionContext,
    ) -> TransportResult<()> {
        let message = TransportMessage::from(request);

        if !ctx.is_transactional() {
            storage::enqueue(
                &self.keys,
                destination,
                &message,
                ExecutionTarget::Immediate(&mut self.client),
            )
            .await?;
            return Ok(());
        }

        let transaction = Transaction::get_or_create(
            ctx,
            &mut self.client,
            &self.keys,
            self.transaction_timeout,
        )
        .await?;
        storage::enqueue(
            &self.keys,
            destination,
            &message,
            ExecutionTarget::Deferred(transaction),
        )
        .await?;
        Ok(())
    }

    /// Receive the oldest available message from the input queue.
    ///
    /// `None` means nothing is currently available to this consumer.
    pub async fn receive_message(
        &mut self,
        ctx: &mut dyn TransactionContext,
    ) -> TransportResult<Option<ReceivedMessage>> {
        if !ctx.is_transactional() {
            return storage::dequeue_direct(&mut self.client, &self.keys, &self.input_queue).await;
        }

        sweep::sweep(&mut self.client, &self.keys, &self.input_queue).await?;

        let transaction = Transaction::get_or_create(
            ctx,
            &mut self.client,
            &self.keys,
            self.transaction_timeout,
        )
        .await?;
        rollback_log::receive_transactional(
            &mut self.client,
            &self.keys,
            &self.input_queue,
            transaction,
        )
        .await
    }

    /// Apply everything `ctx` prepared. No-op if `ctx` never started a
    /// transaction.
    pub async fn commit(&mut self, ctx: &mut dyn TransactionContext) -> TransportResult<()> {
        self.flush(ctx, Phase::Commit).await
    }

    /// Undo everything `ctx` received and drop what it sent
    pub async fn rollback(&mut self, ctx: &mut dyn TransactionContext) -> TransportResult<()> {
        self.flush(ctx, Phase::Rollback).await
    }

    /// Leave the transaction of `ctx` exactly as a crashed worker would
    pub fn abort_without_rollback(&self, ctx: &mut dyn TransactionContext) {
        if let Some(transaction) = Transaction::get(ctx) {
            transaction.abort_without_rollback();
        }
    }

    /// Return messages held by dead transactions to `queue_name`
    pub async fn sweep(&mut self, queue_name: &str) -> TransportResult<SweepReport> {
        sweep::sweep(&mut self.client, &self.keys, queue_name).await
    }

    pub async fn is_alive(&mut self, transaction_id: u64) -> TransportResult<bool> {
        Ok(self
            .client
            .exists(&self.keys.transaction_lock(transaction_id))
            .await?)
    }

    pub async fn ping(&mut self) -> TransportResult<()> {
        Ok(self.client.ping().await?)
    }

    pub fn inspector(&self) -> QueueInspector {
        QueueInspector::new(self.client.clone(), self.keys.clone())
    }

    async fn flush(&mut self, ctx: &mut dyn TransactionContext, phase: Phase) -> TransportResult<()> {
        match Transaction::get(ctx) {
            Some(transaction) => transaction.flush(phase, &mut self.client).await,
            None => Ok(()),
        }
    }
}
