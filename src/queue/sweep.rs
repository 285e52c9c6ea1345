//! Recovery of messages held by dead transactions.
//!
//! Every transaction registered in a queue's transaction set is checked; the
//! liveness check and the drain of its rollback queue run in one script, so
//! a transaction that is still alive is never touched.

use crate::keys::KeyLayout;
use crate::scripts::{LOCK_REFUSED, SWEEP_SCRIPT};
use rebus_error::TransportResult;
use rebus_metrics::{RECOVERED_MESSAGES_TOTAL, SWEPT_TRANSACTIONS_TOTAL};
use rebus_store::RedisClient;
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries found in the transaction set
    pub inspected: usize,
    /// Dead transactions removed from the set
    pub reclaimed: usize,
    /// Ids moved back onto the main queue
    pub recovered_messages: u64,
}

pub async fn sweep(
    client: &mut RedisClient,
    keys: &KeyLayout,
    queue_name: &str,
) -> TransportResult<SweepReport> {
    let set_key = keys.transactions(queue_name);
    let queue_key = keys.queue(queue_name);
    let members: Vec<String> = client.smembers(&set_key).await?;

    let mut report = SweepReport::default();
    for member in members {
        report.inspected += 1;

        let Ok(transaction_id) = member.parse::<u64>() else {
            tracing::warn!(queue = %queue_name, member = %member, "Dropping invalid transaction id");
            client.srem(&set_key, &member).await?;
            continue;
        };

        let lock_key = keys.transaction_lock(transaction_id);
        let rollback_key = keys.rollback_queue(queue_name, transaction_id);
        let moved: i64 = client
            .eval_script(
                &SWEEP_SCRIPT,
                &[
                    lock_key.as_str(),
                    rollback_key.as_str(),
                    queue_key.as_str(),
                    set_key.as_str(),
                ],
                &[transaction_id],
            )
            .await?;

        if moved == LOCK_REFUSED {
            continue;
        }

        report.reclaimed += 1;
        report.recovered_messages += moved as u64;
        tracing::info!(
            queue = %queue_name,
            transaction_id,
            recovered = moved,
            "Reclaimed dead transaction"
        );
    }

    if report.reclaimed > 0 {
        SWEPT_TRANSACTIONS_TOTAL.inc_by(report.reclaimed as u64);
        RECOVERED_MESSAGES_TOTAL.inc_by(report.recovered_messages);
    }
    Ok(report)
}
