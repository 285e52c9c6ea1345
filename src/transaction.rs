// ============================================================================
// Transaction Manager
// ============================================================================
//
// A transaction is a store-resident liveness lock plus two batches of
// deferred operations. Receives and transactional sends only prepare work;
// the host decides the outcome and the matching batch is flushed in a single
// script that deletes the lock as its first step.
//
// States:
//   Open -> Committed    commit batch applied
//   Open -> RolledBack   rollback batch applied
//   Open -> Abandoned    dirty abort, or commit attempted after the lock expired
//
// Abandoned transactions leave their rollback queues for Sweep to reclaim.
//
// ============================================================================

mod batch;

pub use batch::{Batch, BatchOp};

use crate::context::TransactionContext;
use crate::keys::KeyLayout;
use crate::queue::storage::ceil_seconds;
use crate::scripts::{FLUSH_SCRIPT, LOCK_REFUSED};
use rebus_error::{TransportError, TransportResult};
use rebus_metrics::{MESSAGES_SENT_TOTAL, TRANSACTIONS_TOTAL};
use rebus_store::RedisClient;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Scratch-storage slot holding the transaction of a unit of work
pub const CONTEXT_KEY: &str = "redis:context";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
    Abandoned,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Open => "open",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
            TransactionState::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Commit,
    Rollback,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Commit => "commit",
            Phase::Rollback => "rollback",
        }
    }
}

#[derive(Debug)]
pub struct Transaction {
    id: u64,
    lock_key: String,
    message_counter_key: String,
    state: TransactionState,
    commit_batch: Batch,
    rollback_batch: Batch,
    registered_queues: BTreeSet<String>,
}

impl Transaction {
    /// Allocate an id and write the liveness lock
    pub async fn begin(
        client: &mut RedisClient,
        keys: &KeyLayout,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let id = client.incr(&keys.transaction_counter()).await?;
        let transaction = Self::open(id, keys);
        let ttl_secs = ceil_seconds(timeout).max(1);

        client.set_ex(&transaction.lock_key, id, ttl_secs).await?;

        TRANSACTIONS_TOTAL.with_label_values(&["begun"]).inc();
        tracing::debug!(transaction_id = id, ttl_secs, "Transaction begun");
        Ok(transaction)
    }

    /// In-memory transaction for an id whose lock is managed elsewhere
    pub(crate) fn open(id: u64, keys: &KeyLayout) -> Self {
        Self {
            id,
            lock_key: keys.transaction_lock(id),
            message_counter_key: keys.message_counter(),
            state: TransactionState::Open,
            commit_batch: Batch::default(),
            rollback_batch: Batch::default(),
            registered_queues: BTreeSet::new(),
        }
    }

    /// The transaction memoized on `ctx`, beginning one on first use
    pub async fn get_or_create<'c>(
        ctx: &'c mut dyn TransactionContext,
        client: &mut RedisClient,
        keys: &KeyLayout,
        timeout: Duration,
    ) -> TransportResult<&'c mut Transaction> {
        if !ctx.is_transactional() {
            return Err(TransportError::NotTransactional);
        }

        let exists = ctx
            .item_mut(CONTEXT_KEY)
            .map_or(false, |item| item.is::<Transaction>());
        if !exists {
            let transaction = Self::begin(client, keys, timeout).await?;
            ctx.set_item(CONTEXT_KEY, Box::new(transaction));
        }

        let transaction = Self::get(ctx)
            .ok_or_else(|| TransportError::internal("transaction missing from context"))?;
        transaction.ensure_open()?;
        Ok(transaction)
    }

    /// The transaction memoized on `ctx`, if any
    pub fn get(ctx: &mut dyn TransactionContext) -> Option<&mut Transaction> {
        ctx.item_mut(CONTEXT_KEY)?.downcast_mut::<Transaction>()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn commit_batch(&self) -> &Batch {
        &self.commit_batch
    }

    pub fn rollback_batch(&self) -> &Batch {
        &self.rollback_batch
    }

    pub fn prepare_on_commit(&mut self, op: BatchOp) -> TransportResult<()> {
        self.ensure_open()?;
        self.commit_batch.push(op);
        Ok(())
    }

    /// Rollback operations are applied newest first
    pub fn prepare_on_rollback(&mut self, op: BatchOp) -> TransportResult<()> {
        self.ensure_open()?;
        self.rollback_batch.push(op);
        Ok(())
    }

    /// Record that this transaction has an entry in `queue_name`'s
    /// transaction set, so either outcome removes it again
    pub fn register_queue(&mut self, queue_name: &str, keys: &KeyLayout) -> TransportResult<()> {
        self.ensure_open()?;
        if self.registered_queues.insert(queue_name.to_string()) {
            let unregister = BatchOp::Unregister {
                set_key: keys.transactions(queue_name),
                transaction_id: self.id,
            };
            self.commit_batch.push(unregister.clone());
            self.rollback_batch.push(unregister);
        }
        Ok(())
    }

    pub fn registered_queues(&self) -> impl Iterator<Item = &str> {
        self.registered_queues.iter().map(String::as_str)
    }

    /// Simulate a crash: neither batch will ever run and the lock is left
    /// to expire
    pub fn abort_without_rollback(&mut self) {
        if self.state != TransactionState::Open {
            return;
        }
        self.state = TransactionState::Abandoned;
        self.commit_batch.clear();
        self.rollback_batch.clear();

        TRANSACTIONS_TOTAL.with_label_values(&["abandoned"]).inc();
        tracing::info!(transaction_id = self.id, "Transaction aborted without rollback");
    }

    /// Script arguments for flushing `phase`
    pub fn flush_arguments(&self, phase: Phase) -> Vec<Vec<u8>> {
        let mut args = vec![phase.as_str().as_bytes().to_vec()];
        match phase {
            Phase::Commit => self.commit_batch.encode_into(&mut args, false),
            Phase::Rollback => self.rollback_batch.encode_into(&mut args, true),
        }
        args
    }

    /// Apply the batch for `phase` atomically.
    ///
    /// Flushing an abandoned transaction does nothing. Flushing a committed
    /// or rolled back one is an error. A commit whose lock has already
    /// expired applies nothing, abandons the transaction and fails with
    /// [`TransportError::TransactionExpired`].
    pub async fn flush(&mut self, phase: Phase, client: &mut RedisClient) -> TransportResult<()> {
        if !self.is_flushable()? {
            tracing::debug!(
                transaction_id = self.id,
                phase = phase.as_str(),
                "Skipping flush of abandoned transaction"
            );
            return Ok(());
        }

        let args = self.flush_arguments(phase);
        let applied: i64 = client
            .eval_script(
                &FLUSH_SCRIPT,
                &[self.lock_key.as_str(), self.message_counter_key.as_str()],
                &args,
            )
            .await?;

        if applied == LOCK_REFUSED {
            self.state = TransactionState::Abandoned;
            self.commit_batch.clear();
            self.rollback_batch.clear();
            TRANSACTIONS_TOTAL.with_label_values(&["abandoned"]).inc();
            tracing::warn!(
                transaction_id = self.id,
                "Transaction lock expired before commit; messages left for sweep"
            );
            return Err(TransportError::TransactionExpired {
                transaction_id: self.id,
            });
        }

        let (state, event) = match phase {
            Phase::Commit => {
                let sends = self.commit_batch.send_count() as u64;
                if sends > 0 {
                    MESSAGES_SENT_TOTAL
                        .with_label_values(&["deferred"])
                        .inc_by(sends);
                }
                (TransactionState::Committed, "committed")
            }
            Phase::Rollback => (TransactionState::RolledBack, "rolled_back"),
        };
        self.state = state;
        self.commit_batch.clear();
        self.rollback_batch.clear();

        TRANSACTIONS_TOTAL.with_label_values(&[event]).inc();
        tracing::debug!(transaction_id = self.id, applied, "Transaction {}", state);
        Ok(())
    }

    /// True while the liveness lock exists
    pub async fn is_alive(&self, client: &mut RedisClient) -> TransportResult<bool> {
        Ok(client.exists(&self.lock_key).await?)
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.state == TransactionState::Open {
            Ok(())
        } else {
            Err(self.completed_error())
        }
    }

    /// Ok(false) for an abandoned transaction, error once completed
    fn is_flushable(&self) -> TransportResult<bool> {
        match self.state {
            TransactionState::Open => Ok(true),
            TransactionState::Abandoned => Ok(false),
            TransactionState::Committed | TransactionState::RolledBack => {
                Err(self.completed_error())
            }
        }
    }

    fn completed_error(&self) -> TransportError {
        TransportError::TransactionCompleted {
            transaction_id: self.id,
            state: self.state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UnitOfWork;

    fn strings(args: &[Vec<u8>]) -> Vec<String> {
        args.iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect()
    }

    fn receive_into(transaction: &mut Transaction, keys: &KeyLayout, message_id: &str) {
        let rollback_key = keys.rollback_queue("orders", transaction.id());
        transaction.register_queue("orders", keys).unwrap();
        transaction
            .prepare_on_commit(BatchOp::DeleteBody {
                message_key: keys.message(message_id),
            })
            .unwrap();
        transaction
            .prepare_on_commit(BatchOp::Forget {
                rollback_key: rollback_key.clone(),
                message_id: message_id.to_string(),
            })
            .unwrap();
        transaction
            .prepare_on_rollback(BatchOp::Restore {
                rollback_key,
                queue_key: keys.queue("orders"),
                message_id: message_id.to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_commit_arguments_keep_order() {
        let keys = KeyLayout::default();
        let mut transaction = Transaction::open(9, &keys);
        receive_into(&mut transaction, &keys, "101");

        assert_eq!(
            strings(&transaction.flush_arguments(Phase::Commit)),
            vec![
                "commit",
                "srem",
                "rebus:queue:orders:transactions",
                "9",
                "del",
                "101",
                "lrem",
                "rebus:queue:orders:rollback:9",
                "101",
            ]
        );
    }

    #[test]
    fn test_rollback_arguments_restore_newest_first() {
        let keys = KeyLayout::default();
        let mut transaction = Transaction::open(4, &keys);
        receive_into(&mut transaction, &keys, "1");
        receive_into(&mut transaction, &keys, "2");

        // one registration per queue
        assert_eq!(transaction.registered_queues().count(), 1);
        assert_eq!(transaction.rollback_batch().len(), 3);

        assert_eq!(
            strings(&transaction.flush_arguments(Phase::Rollback)),
            vec![
                "rollback",
                "restore",
                "rebus:queue:orders:rollback:4",
                "rebus:queue:orders",
                "2",
                "restore",
                "rebus:queue:orders:rollback:4",
                "rebus:queue:orders",
                "1",
                "srem",
                "rebus:queue:orders:transactions",
                "4",
            ]
        );
    }

    #[test]
    fn test_abort_without_rollback_discards_batches() {
        let keys = KeyLayout::default();
        let mut transaction = Transaction::open(5, &keys);
        receive_into(&mut transaction, &keys, "77");

        transaction.abort_without_rollback();
        assert_eq!(transaction.state(), TransactionState::Abandoned);
        assert!(transaction.commit_batch().is_empty());
        assert!(transaction.rollback_batch().is_empty());

        // flushing later is a silent no-op
        assert!(!transaction.is_flushable().unwrap());
        // but nothing new may be prepared
        let err = transaction
            .prepare_on_commit(BatchOp::DeleteBody {
                message_key: "78".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "TRANSACTION_COMPLETED");
    }

    #[test]
    fn test_completed_transaction_cannot_flush_again() {
        let keys = KeyLayout::default();
        let mut transaction = Transaction::open(6, &keys);
        transaction.state = TransactionState::Committed;

        match transaction.is_flushable() {
            Err(TransportError::TransactionCompleted {
                transaction_id,
                state,
            }) => {
                assert_eq!(transaction_id, 6);
                assert_eq!(state, "committed");
            }
            other => panic!("expected TransactionCompleted, got {:?}", other),
        }
    }

    #[test]
    fn test_get_returns_memoized_transaction() {
        let keys = KeyLayout::default();
        let mut ctx = UnitOfWork::transactional();
        assert!(Transaction::get(&mut ctx).is_none());

        ctx.set_item(CONTEXT_KEY, Box::new(Transaction::open(12, &keys)));
        assert_eq!(Transaction::get(&mut ctx).map(|t| t.id()), Some(12));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TransactionState::RolledBack.to_string(), "rolled back");
        assert_eq!(Phase::Commit.as_str(), "commit");
    }
}
