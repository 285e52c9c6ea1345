// ============================================================================
// Rollback Log - transactional receive
// ============================================================================
//
// A transactional receive moves the oldest id from the main queue into the
// transaction's rollback queue and registers the transaction in the queue's
// transaction set, in one script. Nothing is deleted until commit:
//
//   commit   -> delete the envelope, drop the id from the rollback queue
//   rollback -> move the id back to the consumer end of the main queue
//
// If the owner dies before either runs, Sweep finds it through the
// transaction set once its lock has expired.
//
// ============================================================================

use crate::keys::KeyLayout;
use crate::scripts::RECEIVE_TRANSACTIONAL_SCRIPT;
use crate::transaction::{BatchOp, Transaction};
use rebus_error::TransportResult;
use rebus_metrics::{EXPIRED_MESSAGES_TOTAL, MESSAGES_RECEIVED_TOTAL};
use rebus_store::RedisClient;
use rebus_types::{codec, ReceivedMessage};

pub async fn receive_transactional(
    client: &mut RedisClient,
    keys: &KeyLayout,
    queue_name: &str,
    transaction: &mut Transaction,
) -> TransportResult<Option<ReceivedMessage>> {
    let queue_key = keys.queue(queue_name);
    let rollback_key = keys.rollback_queue(queue_name, transaction.id());
    let set_key = keys.transactions(queue_name);

    let reply: Option<(String, Option<Vec<u8>>)> = client
        .eval_script(
            &RECEIVE_TRANSACTIONAL_SCRIPT,
            &[queue_key.as_str(), rollback_key.as_str(), set_key.as_str()],
            &[transaction.id()],
        )
        .await?;

    let Some((message_id, envelope)) = reply else {
        return Ok(None);
    };

    // Prepared before looking at the envelope: an expired or unreadable
    // slot still has to be cleaned up by whichever outcome runs.
    transaction.register_queue(queue_name, keys)?;
    transaction.prepare_on_commit(BatchOp::DeleteBody {
        message_key: keys.message(&message_id),
    })?;
    transaction.prepare_on_commit(BatchOp::Forget {
        rollback_key: rollback_key.clone(),
        message_id: message_id.clone(),
    })?;
    transaction.prepare_on_rollback(BatchOp::Restore {
        rollback_key,
        queue_key,
        message_id: message_id.clone(),
    })?;

    let Some(envelope) = envelope else {
        EXPIRED_MESSAGES_TOTAL.inc();
        tracing::debug!(
            queue = %queue_name,
            transaction_id = transaction.id(),
            message_id = %message_id,
            "Received expired message"
        );
        return Ok(None);
    };

    let message = codec::unpack(&envelope)?.into_received(message_id);
    MESSAGES_RECEIVED_TOTAL
        .with_label_values(&["transactional"])
        .inc();
    tracing::debug!(
        queue = %queue_name,
        transaction_id = transaction.id(),
        message_id = %message.id,
        "Received message"
    );
    Ok(Some(message))
}
