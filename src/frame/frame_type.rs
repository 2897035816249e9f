use std::convert::TryFrom;

/// The role a frame plays on the wire. Stored in the low three bits of the
/// first header byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Control = 0x00,
    Single = 0x01,
    First = 0x02,
    Consecutive = 0x03,
}

impl TryFrom<u8> for FrameType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(FrameType::Control),
            0x01 => Ok(FrameType::Single),
            0x02 => Ok(FrameType::First),
            0x03 => Ok(FrameType::Consecutive),
            other => Err(other),
        }
    }
}

/// Logical service multiplexed over the physical connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    Control = 0x00,
    Heartbeat = 0x01,
    Rpc = 0x07,
    Audio = 0x0A,
    Video = 0x0B,
    BulkData = 0x0F,
}

impl ServiceType {
    /// Navigation streaming shares the video service on the wire.
    pub const NAV: ServiceType = ServiceType::Video;

    /// Services whose payloads embed a `BinaryFrameHeader` from version 2 on.
    pub fn carries_binary_header(self) -> bool {
        matches!(self, ServiceType::Rpc | ServiceType::BulkData)
    }

    /// Streaming services treat a StartSessionNACK as a recoverable
    /// negotiation result rather than a fatal failure.
    pub fn is_renegotiable(self) -> bool {
        matches!(self, ServiceType::Video)
    }

    /// Services that carry application data (and therefore require an
    /// active session before frames may be sent).
    pub fn is_data_service(self) -> bool {
        !matches!(self, ServiceType::Control | ServiceType::Heartbeat)
    }
}

impl TryFrom<u8> for ServiceType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ServiceType::Control),
            0x01 => Ok(ServiceType::Heartbeat),
            0x07 => Ok(ServiceType::Rpc),
            0x0A => Ok(ServiceType::Audio),
            0x0B => Ok(ServiceType::Video),
            0x0F => Ok(ServiceType::BulkData),
            other => Err(other),
        }
    }
}

/// Subtype carried in `frame_info` of a Control frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlFrameInfo {
    Heartbeat = 0x00,
    StartSession = 0x01,
    StartSessionAck = 0x02,
    StartSessionNack = 0x03,
    EndSession = 0x04,
    EndSessionAck = 0x05,
    EndSessionNack = 0x06,
    HeartbeatAck = 0xFF,
}

impl TryFrom<u8> for ControlFrameInfo {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ControlFrameInfo::Heartbeat),
            0x01 => Ok(ControlFrameInfo::StartSession),
            0x02 => Ok(ControlFrameInfo::StartSessionAck),
            0x03 => Ok(ControlFrameInfo::StartSessionNack),
            0x04 => Ok(ControlFrameInfo::EndSession),
            0x05 => Ok(ControlFrameInfo::EndSessionAck),
            0x06 => Ok(ControlFrameInfo::EndSessionNack),
            0xFF => Ok(ControlFrameInfo::HeartbeatAck),
            other => Err(other),
        }
    }
}
