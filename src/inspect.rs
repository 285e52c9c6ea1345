// ============================================================================
// Queue Inspection - read-only view over the persisted key layout
// ============================================================================

use crate::keys::KeyLayout;
use rebus_error::TransportResult;
use rebus_store::RedisClient;
use rebus_types::{codec, TransportMessage};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionStats {
    /// As stored in the transaction set; not necessarily numeric
    pub transaction_id: String,
    pub alive: bool,
    /// Remaining lock TTL; `None` once the lock is gone or has no expiry
    pub lock_ttl_secs: Option<i64>,
    pub rollback_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queue: String,
    pub depth: u64,
    pub transactions: Vec<TransactionStats>,
}

impl QueueStats {
    /// Ids held by transactions, live or dead
    pub fn in_flight(&self) -> u64 {
        self.transactions.iter().map(|t| t.rollback_len).sum()
    }
}

pub struct QueueInspector {
    client: RedisClient,
    keys: KeyLayout,
}

impl QueueInspector {
    pub fn new(client: RedisClient, keys: KeyLayout) -> Self {
        Self { client, keys }
    }

    pub async fn stats(&mut self, queue_name: &str) -> TransportResult<QueueStats> {
        let depth = self.client.llen(&self.keys.queue(queue_name)).await?;
        let mut members: Vec<String> = self
            .client
            .smembers(&self.keys.transactions(queue_name))
            .await?;
        members.sort();

        let mut transactions = Vec::with_capacity(members.len());
        for member in members {
            let Ok(transaction_id) = member.parse::<u64>() else {
                transactions.push(TransactionStats {
                    transaction_id: member,
                    alive: false,
                    lock_ttl_secs: None,
                    rollback_len: 0,
                });
                continue;
            };

            // -2: no lock, -1: lock without expiry
            let ttl = self
                .client
                .ttl(&self.keys.transaction_lock(transaction_id))
                .await?;
            let rollback_len = self
                .client
                .llen(&self.keys.rollback_queue(queue_name, transaction_id))
                .await?;

            transactions.push(TransactionStats {
                transaction_id: member,
                alive: ttl != -2,
                lock_ttl_secs: (ttl >= 0).then_some(ttl),
                rollback_len,
            });
        }

        Ok(QueueStats {
            queue: queue_name.to_string(),
            depth,
            transactions,
        })
    }

    /// Up to `count` ids in delivery order, oldest first
    pub async fn peek(&mut self, queue_name: &str, count: usize) -> TransportResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let start = -(count.min(isize::MAX as usize) as isize);
        let mut ids: Vec<String> = self
            .client
            .lrange(&self.keys.queue(queue_name), start, -1)
            .await?;
        ids.reverse();
        Ok(ids)
    }

    /// Decoded envelope stored under `message_id`, if it has not expired
    pub async fn message(&mut self, message_id: &str) -> TransportResult<Option<TransportMessage>> {
        let envelope: Option<Vec<u8>> = self.client.get(&self.keys.message(message_id)).await?;
        match envelope {
            Some(bytes) => {
                let mut message = codec::unpack(&bytes)?;
                message.id = Some(message_id.to_string());
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}
