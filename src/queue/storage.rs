// ============================================================================
// Queue Storage - atomic enqueue and direct dequeue
// ============================================================================

use crate::keys::KeyLayout;
use crate::scripts::{DEQUEUE_SCRIPT, ENQUEUE_SCRIPT, NO_ARGS};
use crate::transaction::{BatchOp, Transaction};
use rebus_error::TransportResult;
use rebus_metrics::{EXPIRED_MESSAGES_TOTAL, MESSAGES_RECEIVED_TOTAL, MESSAGES_SENT_TOTAL};
use rebus_store::RedisClient;
use rebus_types::{codec, ReceivedMessage, TransportMessage};
use std::time::Duration;

/// Where an enqueue is executed
pub enum ExecutionTarget<'a> {
    /// Run now; the message is visible as soon as the call returns
    Immediate(&'a mut RedisClient),
    /// Defer to the transaction's commit batch
    Deferred(&'a mut Transaction),
}

/// Whole seconds, rounded up
pub(crate) fn ceil_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// TTL argument for the enqueue script. 0 means the envelope never expires;
/// any present expiration keeps the envelope for at least one second.
pub fn expiry_seconds(expiration: Option<Duration>) -> u64 {
    expiration.map_or(0, |ttl| ceil_seconds(ttl).max(1))
}

/// Store the envelope and push its id onto `queue_name`.
///
/// Returns the assigned id for an immediate enqueue. A deferred enqueue gets
/// its id when the commit batch runs, so `None` is returned.
pub async fn enqueue(
    keys: &KeyLayout,
    queue_name: &str,
    message: &TransportMessage,
    target: ExecutionTarget<'_>,
) -> TransportResult<Option<String>> {
    let envelope = codec::pack(message)?;
    let ttl_secs = expiry_seconds(message.expiration());
    let queue_key = keys.queue(queue_name);

    match target {
        ExecutionTarget::Immediate(client) => {
            let id: u64 = client
                .eval_script(
                    &ENQUEUE_SCRIPT,
                    &[keys.message_counter().as_str(), queue_key.as_str()],
                    &[envelope, ttl_secs.to_string().into_bytes()],
                )
                .await?;

            MESSAGES_SENT_TOTAL.with_label_values(&["immediate"]).inc();
            tracing::debug!(queue = %queue_name, message_id = id, ttl_secs, "Enqueued message");
            Ok(Some(id.to_string()))
        }
        ExecutionTarget::Deferred(transaction) => {
            transaction.prepare_on_commit(BatchOp::Send {
                queue_key,
                envelope,
                ttl_secs,
            })?;

            tracing::debug!(
                queue = %queue_name,
                transaction_id = transaction.id(),
                ttl_secs,
                "Deferred message until commit"
            );
            Ok(None)
        }
    }
}

/// Pop the oldest id, fetch and delete its envelope in one step.
///
/// An id whose envelope has expired is consumed and reported as an empty
/// receive.
pub async fn dequeue_direct(
    client: &mut RedisClient,
    keys: &KeyLayout,
    queue_name: &str,
) -> TransportResult<Option<ReceivedMessage>> {
    let queue_key = keys.queue(queue_name);
    let reply: Option<(String, Option<Vec<u8>>)> = client
        .eval_script(&DEQUEUE_SCRIPT, &[queue_key.as_str()], NO_ARGS)
        .await?;

    let Some((message_id, envelope)) = reply else {
        return Ok(None);
    };
    let Some(envelope) = envelope else {
        EXPIRED_MESSAGES_TOTAL.inc();
        tracing::debug!(queue = %queue_name, message_id = %message_id, "Popped expired message");
        return Ok(None);
    };

    // The script already deleted id and envelope; an undecodable one is lost
    let message = match codec::unpack(&envelope) {
        Ok(message) => message.into_received(message_id),
        Err(e) => {
            tracing::warn!(
                queue = %queue_name,
                message_id = %message_id,
                error = %e,
                "Dropped message with undecodable envelope"
            );
            return Err(e.into());
        }
    };
    MESSAGES_RECEIVED_TOTAL.with_label_values(&["direct"]).inc();
    tracing::debug!(queue = %queue_name, message_id = %message.id, "Received message");
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebus_types::SendRequest;

    #[test]
    fn test_expiry_rounds_up() {
        assert_eq!(expiry_seconds(None), 0);
        assert_eq!(expiry_seconds(Some(Duration::from_secs(5))), 5);
        assert_eq!(expiry_seconds(Some(Duration::from_millis(1_001))), 2);
        assert_eq!(expiry_seconds(Some(Duration::from_millis(10))), 1);
        assert_eq!(expiry_seconds(Some(Duration::ZERO)), 1);
    }

    #[tokio::test]
    async fn test_deferred_enqueue_only_prepares() {
        let keys = KeyLayout::default();
        let mut transaction = Transaction::open(3, &keys);
        let message = TransportMessage::from(
            &SendRequest::new(b"later".to_vec()).with_time_to_be_received(Duration::from_secs(30)),
        );

        let id = enqueue(
            &keys,
            "billing",
            &message,
            ExecutionTarget::Deferred(&mut transaction),
        )
        .await
        .unwrap();

        assert_eq!(id, None);
        match transaction.commit_batch().ops() {
            [BatchOp::Send {
                queue_key,
                envelope,
                ttl_secs,
            }] => {
                assert_eq!(queue_key, "rebus:queue:billing");
                assert_eq!(*ttl_secs, 30);
                assert_eq!(codec::unpack(envelope).unwrap(), message);
            }
            other => panic!("unexpected commit batch {:?}", other),
        }
        assert!(transaction.rollback_batch().is_empty());
    }
}
