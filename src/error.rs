//! Error taxonomy for the codec and dispatcher. NACK-worthy validation
//! failures are never represented here — `Engine::on_new`/`on_cancel` are
//! infallible and encode rejection in-band as `AckBody::status`. These types
//! cover the failures that a correctly-operating engine cannot recover from
//! in-band: malformed frames, protocol mismatches, and transport faults.

use thiserror::Error;

/// Failures from [`crate::wire::codec`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer too small to decode: need {need} bytes, have {have}")]
    ShortBuffer { need: usize, have: usize },

    #[error("frame shorter than header: need at least {need} bytes, have {have}")]
    ShortFrame { need: usize, have: usize },

    #[error("header declares size {declared} but frame is {actual} bytes")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("header declares body size {body_len} which exceeds kMaxFrame ({max})")]
    OversizeFrame { body_len: usize, max: usize },

    #[error("body length mismatch: expected {expected} bytes, got {actual}")]
    BodyLengthMismatch { expected: usize, actual: usize },

    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    #[error("unknown message type byte: {0}")]
    UnknownType(u8),
}

/// Failures surfaced by the session dispatcher. Every variant is fatal for
/// the connection it occurred on; the engine itself is never affected.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("framing error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("peer closed connection mid-frame")]
    UnexpectedEof,
}
