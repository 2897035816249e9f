use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameEncodeError {
    /// Attempted to send on a session whose send guard has been closed.
    #[error("write after session close")]
    WriteAfterClose,

    /// The MTU leaves no room for payload once the header is accounted for.
    #[error("MTU {mtu} cannot hold a {header_size}-byte header plus payload")]
    InvalidMtu { mtu: usize, header_size: usize },

    /// The payload cannot be described by the 32-bit size fields.
    #[error("payload of {size} bytes exceeds the 32-bit size field")]
    PayloadTooLarge { size: usize },

    /// Bulk bytes can only be embedded behind a binary header (version >= 2).
    #[error("bulk payload requires protocol version 2 or later (negotiated {version})")]
    BulkRequiresBinaryHeader { version: u8 },

    /// The binary header carries only 28 bits of function id.
    #[error("function id {function_id:#x} does not fit in 28 bits")]
    FunctionIdOutOfRange { function_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameDecodeError {
    /// Fewer bytes than the version-dependent header size.
    #[error("incomplete header: need {needed} bytes, have {available}")]
    IncompleteHeader { needed: usize, available: usize },

    /// Header parsed but the declared payload has not fully arrived.
    #[error("incomplete payload: need {needed} bytes, have {available}")]
    IncompletePayload { needed: usize, available: usize },

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown frame type {0:#04x}")]
    UnknownFrameType(u8),

    #[error("unknown service type {0:#04x}")]
    UnknownServiceType(u8),

    /// Declared frame size is above the configured ceiling; the byte stream
    /// can no longer be trusted to be aligned on frame boundaries.
    #[error("frame of {size} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { size: usize, max: usize },

    /// A First frame whose payload is not the 8-byte size/count pair.
    #[error("malformed First frame payload ({0} bytes)")]
    MalformedFirstFrame(usize),

    /// Binary header shorter than 12 bytes, or a JSON size pointing past the
    /// end of the payload.
    #[error("malformed binary header")]
    MalformedBinaryHeader,

    #[error("unknown RPC type {0:#03x}")]
    UnknownRpcType(u8),
}
