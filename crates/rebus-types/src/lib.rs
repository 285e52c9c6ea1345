// ============================================================================
// Rebus Types - Message Envelope
// ============================================================================
//
// Data structures exchanged between the host bus and the transport, and the
// binary envelope stored in Redis. No dependencies on the store or on
// transaction handling.
//
// Contents:
// - Send requests and received messages
// - Header values and the time-to-be-received header
// - Envelope codec (MessagePack)
//
// ============================================================================

pub mod codec;
pub mod message;

// Re-exports for convenience
pub use codec::{pack, unpack};
pub use message::*;
