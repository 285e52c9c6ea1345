// ============================================================================
// rebus-redis - transactional message queue on Redis
// ============================================================================
//
// Gives point-to-point queues transactional receive and send using only
// counters, lists, sets, key expiry and small Lua scripts. A receive can be
// undone until its unit of work commits; a crashed consumer's messages come
// back once its transaction lock expires.
//
// ============================================================================

pub mod context;
pub mod inspect;
pub mod keys;
pub mod queue;
mod scripts;
pub mod transaction;

pub use context::{TransactionContext, UnitOfWork};
pub use inspect::{QueueInspector, QueueStats, TransactionStats};
pub use keys::KeyLayout;
pub use queue::{RedisMessageQueue, SweepReport};
pub use transaction::{Batch, BatchOp, Phase, Transaction, TransactionState};

pub use rebus_config::{Config, RedisConfig};
pub use rebus_error::{TransportError, TransportResult};
pub use rebus_types::{
    codec, HeaderValue, Headers, ReceivedMessage, SendRequest, TransportMessage,
    TIME_TO_BE_RECEIVED,
};
