//! Deferred operations accumulated by a transaction and applied in one
//! atomic flush.

/// One deferred store mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Allocate an id, store the envelope and push the id onto `queue_key`
    Send {
        queue_key: String,
        envelope: Vec<u8>,
        ttl_secs: u64,
    },
    /// Delete a message envelope
    DeleteBody { message_key: String },
    /// Drop a received id from the transaction's rollback queue
    Forget {
        rollback_key: String,
        message_id: String,
    },
    /// Move a received id from the rollback queue back to the consumer end
    /// of the main queue; no-op if the id is no longer in the rollback queue
    Restore {
        rollback_key: String,
        queue_key: String,
        message_id: String,
    },
    /// Remove the transaction from a queue's transaction set
    Unregister { set_key: String, transaction_id: u64 },
}

impl BatchOp {
    /// Append the flat argument form the flush script understands
    pub fn encode_into(&self, args: &mut Vec<Vec<u8>>) {
        match self {
            BatchOp::Send {
                queue_key,
                envelope,
                ttl_secs,
            } => {
                args.push(b"send".to_vec());
                args.push(queue_key.as_bytes().to_vec());
                args.push(envelope.clone());
                args.push(ttl_secs.to_string().into_bytes());
            }
            BatchOp::DeleteBody { message_key } => {
                args.push(b"del".to_vec());
                args.push(message_key.as_bytes().to_vec());
            }
            BatchOp::Forget {
                rollback_key,
                message_id,
            } => {
                args.push(b"lrem".to_vec());
                args.push(rollback_key.as_bytes().to_vec());
                args.push(message_id.as_bytes().to_vec());
            }
            BatchOp::Restore {
                rollback_key,
                queue_key,
                message_id,
            } => {
                args.push(b"restore".to_vec());
                args.push(rollback_key.as_bytes().to_vec());
                args.push(queue_key.as_bytes().to_vec());
                args.push(message_id.as_bytes().to_vec());
            }
            BatchOp::Unregister {
                set_key,
                transaction_id,
            } => {
                args.push(b"srem".to_vec());
                args.push(set_key.as_bytes().to_vec());
                args.push(transaction_id.to_string().into_bytes());
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn push(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Deferred sends in this batch
    pub fn send_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, BatchOp::Send { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Encode in insertion order, or newest first when `reverse` is set
    pub fn encode_into(&self, args: &mut Vec<Vec<u8>>, reverse: bool) {
        if reverse {
            self.ops.iter().rev().for_each(|op| op.encode_into(args));
        } else {
            self.ops.iter().for_each(|op| op.encode_into(args));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strings(args: &[Vec<u8>]) -> Vec<String> {
        args.iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect()
    }

    #[test]
    fn test_encode_each_operation() {
        let mut args = Vec::new();
        BatchOp::Send {
            queue_key: "rebus:queue:q".to_string(),
            envelope: b"env".to_vec(),
            ttl_secs: 0,
        }
        .encode_into(&mut args);
        BatchOp::DeleteBody {
            message_key: "7".to_string(),
        }
        .encode_into(&mut args);
        BatchOp::Forget {
            rollback_key: "rebus:queue:q:rollback:3".to_string(),
            message_id: "7".to_string(),
        }
        .encode_into(&mut args);
        BatchOp::Restore {
            rollback_key: "rebus:queue:q:rollback:3".to_string(),
            queue_key: "rebus:queue:q".to_string(),
            message_id: "7".to_string(),
        }
        .encode_into(&mut args);
        BatchOp::Unregister {
            set_key: "rebus:queue:q:transactions".to_string(),
            transaction_id: 3,
        }
        .encode_into(&mut args);

        assert_eq!(
            as_strings(&args),
            vec![
                "send",
                "rebus:queue:q",
                "env",
                "0",
                "del",
                "7",
                "lrem",
                "rebus:queue:q:rollback:3",
                "7",
                "restore",
                "rebus:queue:q:rollback:3",
                "rebus:queue:q",
                "7",
                "srem",
                "rebus:queue:q:transactions",
                "3",
            ]
        );
    }

    #[test]
    fn test_reverse_encoding() {
        let mut batch = Batch::default();
        batch.push(BatchOp::DeleteBody {
            message_key: "1".to_string(),
        });
        batch.push(BatchOp::DeleteBody {
            message_key: "2".to_string(),
        });
        assert_eq!(batch.len(), 2);

        let mut args = Vec::new();
        batch.encode_into(&mut args, true);
        assert_eq!(as_strings(&args), vec!["del", "2", "del", "1"]);

        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_send_count_ignores_other_operations() {
        let mut batch = Batch::default();
        assert_eq!(batch.send_count(), 0);

        for queue in ["a", "b"] {
            batch.push(BatchOp::Send {
                queue_key: format!("rebus:queue:{}", queue),
                envelope: Vec::new(),
                ttl_secs: 0,
            });
        }
        batch.push(BatchOp::DeleteBody {
            message_key: "9".to_string(),
        });

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.send_count(), 2);
    }
}
