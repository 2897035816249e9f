use crate::frame::{FrameDecodeError, FrameEncodeError, ServiceType};
use std::time::Duration;
use thiserror::Error;

/// Everything the engine reports to its caller as going wrong.
///
/// Apart from [`HandshakeRejected`](Self::HandshakeRejected) these are
/// warnings: the offending frame or operation is discarded and the
/// connection carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Malformed or truncated frame.
    #[error("format error: {0}")]
    Format(#[from] FrameDecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] FrameEncodeError),

    /// Operation refused because it does not fit the session's state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("{service_type:?} session rejected by peer: {reason}")]
    HandshakeRejected {
        service_type: ServiceType,
        reason: String,
    },

    #[error("no traffic on session {session_id} for {timeout:?}")]
    LivenessTimeout { session_id: u8, timeout: Duration },

    #[error("unknown control subtype {code:#04x} on session {session_id}")]
    UnknownControlFrame { session_id: u8, code: u8 },

    #[error("frame for unknown message {message_id} on session {session_id}")]
    UnknownReassemblyTarget { session_id: u8, message_id: u32 },

    #[error("duplicate First frame for message {message_id} on session {session_id}")]
    DuplicateFirstFrame { session_id: u8, message_id: u32 },

    #[error("message {message_id} on session {session_id} declares {size} bytes (max {max})")]
    MessageTooLarge {
        session_id: u8,
        message_id: u32,
        size: usize,
        max: usize,
    },

    #[error("message {message_id} on session {session_id} evicted to make room")]
    ReassemblyEvicted { session_id: u8, message_id: u32 },

    #[error("message {message_id} on session {session_id} overran its declared {declared} bytes")]
    ReassemblyOverflow {
        session_id: u8,
        message_id: u32,
        declared: usize,
    },

    #[error(
        "message {message_id} on session {session_id} ended at {received} of {declared} bytes"
    )]
    ReassemblySizeMismatch {
        session_id: u8,
        message_id: u32,
        declared: usize,
        received: usize,
    },

    #[error("message {message_id} on session {session_id} abandoned after {age:?}")]
    ReassemblyExpired {
        session_id: u8,
        message_id: u32,
        age: Duration,
    },
}

impl ProtocolError {
    /// Whether the error ends the requested session for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::HandshakeRejected { service_type, .. } if !service_type.is_renegotiable()
        )
    }
}
