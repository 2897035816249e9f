use crate::{
    constants::CONSECUTIVE_FRAME_TERMINATOR,
    frame::{ControlFrameInfo, FrameHeader, FrameType, HeaderFields, ServiceType},
};

/// Represents a single frame of data on the wire.
///
/// A frame is the unit written to and read from the transport. Several
/// frames may share one transport chunk, and one frame may be split across
/// several chunks; reconstructing whole frames is the job of
/// [`FrameStreamDecoder`](crate::frame::FrameStreamDecoder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version; selects the 8-byte (v1) or 12-byte (v2+) header.
    pub version: u8,

    pub encrypted: bool,

    pub frame_type: FrameType,

    pub service_type: ServiceType,

    /// Control subtype for Control frames; 1-based sequence number (or the
    /// `0x00` terminator) for Consecutive frames; zero otherwise.
    pub frame_info: u8,

    pub session_id: u8,

    /// Only transmitted from version 2 onward. Decoded v1 frames carry `0`.
    pub message_id: u32,

    /// The raw payload. Its length is written as the header's data size.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Builds an empty-payload Control frame.
    pub fn control(
        version: u8,
        service_type: ServiceType,
        info: ControlFrameInfo,
        session_id: u8,
        message_id: u32,
    ) -> Self {
        Self {
            version,
            encrypted: false,
            frame_type: FrameType::Control,
            service_type,
            frame_info: info as u8,
            session_id,
            message_id,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn data_size(&self) -> u32 {
        self.payload.len() as u32
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(
            HeaderFields {
                version: self.version,
                encrypted: self.encrypted,
                frame_type: self.frame_type,
                service_type: self.service_type,
                frame_info: self.frame_info,
                session_id: self.session_id,
                data_size: self.data_size(),
            },
            self.message_id,
        )
    }

    /// Control subtype, or the raw unrecognized code.
    ///
    /// Only meaningful for `FrameType::Control`.
    pub fn control_info(&self) -> Result<ControlFrameInfo, u8> {
        ControlFrameInfo::try_from(self.frame_info)
    }

    /// Whether this is the last Consecutive frame of a fragmented message.
    pub fn is_terminal(&self) -> bool {
        self.frame_type == FrameType::Consecutive
            && self.frame_info == CONSECUTIVE_FRAME_TERMINATOR
    }
}
