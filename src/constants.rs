use std::time::Duration;

// Frame header layout (all multi-byte fields are big-endian)
pub const FRAME_VERSION_OFFSET: usize = 0;
pub const FRAME_SERVICE_TYPE_OFFSET: usize = 1;
pub const FRAME_INFO_OFFSET: usize = 2;
pub const FRAME_SESSION_ID_OFFSET: usize = 3;
pub const FRAME_DATA_SIZE_OFFSET: usize = 4;
pub const FRAME_MESSAGE_ID_OFFSET: usize = 8;

/// Header size for protocol version 1 frames.
pub const FRAME_HEADER_SIZE_V1: usize = 8;

/// Header size for protocol version 2 and later. The extra four bytes
/// carry the message id.
pub const FRAME_HEADER_SIZE_V2: usize = 12;

pub const FRAME_VERSION_MASK: u8 = 0xF0;
pub const FRAME_ENCRYPTED_MASK: u8 = 0x08;
pub const FRAME_TYPE_MASK: u8 = 0x07;

/// `frame_info` value carried by the last Consecutive frame of a message.
pub const CONSECUTIVE_FRAME_TERMINATOR: u8 = 0x00;

/// Size of the First frame payload: total byte length (u32) + frame count (u32).
pub const FIRST_FRAME_PAYLOAD_SIZE: usize = 8;

/// Size of the binary header embedded in RPC and bulk payloads (version >= 2).
pub const BINARY_HEADER_SIZE: usize = 12;

/// Bits of the first binary-header word reserved for the function id.
pub const BINARY_HEADER_FUNCTION_ID_MASK: u32 = 0x0FFF_FFFF;

/// Bit shift of the RPC type nibble inside the first binary-header word.
pub const BINARY_HEADER_RPC_TYPE_SHIFT: u32 = 28;

/// Session id used by StartSession before the peer assigns a real one.
pub const PLACEHOLDER_SESSION_ID: u8 = 0;

pub const MIN_PROTOCOL_VERSION: u8 = 1;
pub const MAX_PROTOCOL_VERSION: u8 = 5;

/// Maximum total frame size (header + payload) assumed for the transport.
pub const DEFAULT_MTU: usize = 1500;

/// Largest logical message the reassembler will accept.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Largest single inbound frame the stream decoder will buffer.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 128 * 1024;

/// Upper bound on concurrently in-flight reassembly contexts.
pub const DEFAULT_MAX_REASSEMBLY_CONTEXTS: usize = 64;

/// How long a partially reassembled message may wait for its terminal frame.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval at which Heartbeat control frames are sent on each active session.
pub const DEFAULT_HEARTBEAT_SEND_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum peer silence on a session before it is reported as dead.
pub const DEFAULT_HEARTBEAT_RECEIVE_INTERVAL: Duration = Duration::from_secs(15);
