//! Envelope codec: MessagePack with named fields, so stored envelopes stay
//! readable by other tooling and tolerate added fields.

use crate::message::TransportMessage;

pub fn pack(message: &TransportMessage) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::encode::to_vec_named(message)
}

pub fn unpack(bytes: &[u8]) -> Result<TransportMessage, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}
