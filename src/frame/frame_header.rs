use crate::{
    constants::{
        FRAME_DATA_SIZE_OFFSET, FRAME_ENCRYPTED_MASK, FRAME_HEADER_SIZE_V1, FRAME_HEADER_SIZE_V2,
        FRAME_INFO_OFFSET, FRAME_MESSAGE_ID_OFFSET, FRAME_SERVICE_TYPE_OFFSET,
        FRAME_SESSION_ID_OFFSET, FRAME_TYPE_MASK, FRAME_VERSION_MASK, FRAME_VERSION_OFFSET,
        MAX_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION,
    },
    frame::{FrameDecodeError, FrameType, ServiceType},
};

/// Fields shared by every header shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFields {
    pub version: u8,
    pub encrypted: bool,
    pub frame_type: FrameType,
    pub service_type: ServiceType,
    pub frame_info: u8,
    pub session_id: u8,
    pub data_size: u32,
}

/// Version-dependent frame header.
///
/// Version 1 headers are 8 bytes. Every later version appends a 4-byte
/// message id, for 12 bytes total. Keeping the two shapes as variants means
/// the header size and the presence of a message id travel with the value
/// instead of being looked up from shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    V1(HeaderFields),
    V2 { fields: HeaderFields, message_id: u32 },
}

impl FrameHeader {
    /// Builds the header shape matching `fields.version`. The message id is
    /// dropped for version 1.
    pub fn new(fields: HeaderFields, message_id: u32) -> Self {
        if fields.version < 2 {
            FrameHeader::V1(fields)
        } else {
            FrameHeader::V2 { fields, message_id }
        }
    }

    pub fn size_for_version(version: u8) -> usize {
        if version < 2 {
            FRAME_HEADER_SIZE_V1
        } else {
            FRAME_HEADER_SIZE_V2
        }
    }

    pub fn size(&self) -> usize {
        match self {
            FrameHeader::V1(_) => FRAME_HEADER_SIZE_V1,
            FrameHeader::V2 { .. } => FRAME_HEADER_SIZE_V2,
        }
    }

    pub fn fields(&self) -> &HeaderFields {
        match self {
            FrameHeader::V1(fields) => fields,
            FrameHeader::V2 { fields, .. } => fields,
        }
    }

    /// Message id, or `0` for version 1 headers which have none.
    pub fn message_id(&self) -> u32 {
        match self {
            FrameHeader::V1(_) => 0,
            FrameHeader::V2 { message_id, .. } => *message_id,
        }
    }

    /// Header size plus declared payload size.
    pub fn frame_len(&self) -> usize {
        self.size() + self.fields().data_size as usize
    }

    /// Reads only the version nibble and validates it.
    pub fn peek_version(buf: &[u8]) -> Result<u8, FrameDecodeError> {
        let first = buf
            .get(FRAME_VERSION_OFFSET)
            .copied()
            .ok_or(FrameDecodeError::IncompleteHeader {
                needed: FRAME_HEADER_SIZE_V1,
                available: buf.len(),
            })?;

        let version = (first & FRAME_VERSION_MASK) >> 4;
        if !(MIN_PROTOCOL_VERSION..=MAX_PROTOCOL_VERSION).contains(&version) {
            return Err(FrameDecodeError::UnsupportedVersion(version));
        }

        Ok(version)
    }

    pub fn parse(buf: &[u8]) -> Result<Self, FrameDecodeError> {
        let version = Self::peek_version(buf)?;
        let header_size = Self::size_for_version(version);

        if buf.len() < header_size {
            return Err(FrameDecodeError::IncompleteHeader {
                needed: header_size,
                available: buf.len(),
            });
        }

        let first = buf[FRAME_VERSION_OFFSET];
        let frame_type = FrameType::try_from(first & FRAME_TYPE_MASK)
            .map_err(FrameDecodeError::UnknownFrameType)?;
        let service_type = ServiceType::try_from(buf[FRAME_SERVICE_TYPE_OFFSET])
            .map_err(FrameDecodeError::UnknownServiceType)?;

        let fields = HeaderFields {
            version,
            encrypted: first & FRAME_ENCRYPTED_MASK != 0,
            frame_type,
            service_type,
            frame_info: buf[FRAME_INFO_OFFSET],
            session_id: buf[FRAME_SESSION_ID_OFFSET],
            data_size: read_u32_be(buf, FRAME_DATA_SIZE_OFFSET),
        };

        if version < 2 {
            Ok(FrameHeader::V1(fields))
        } else {
            Ok(FrameHeader::V2 {
                fields,
                message_id: read_u32_be(buf, FRAME_MESSAGE_ID_OFFSET),
            })
        }
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        let fields = self.fields();

        let mut first = (fields.version << 4) & FRAME_VERSION_MASK;
        if fields.encrypted {
            first |= FRAME_ENCRYPTED_MASK;
        }
        first |= fields.frame_type as u8 & FRAME_TYPE_MASK;

        buf.push(first);
        buf.push(fields.service_type as u8);
        buf.push(fields.frame_info);
        buf.push(fields.session_id);
        buf.extend(&fields.data_size.to_be_bytes());

        if let FrameHeader::V2 { message_id, .. } = self {
            buf.extend(&message_id.to_be_bytes());
        }
    }
}

/// Caller guarantees `offset + 4 <= buf.len()`.
pub(crate) fn read_u32_be(buf: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_be_bytes(word)
}
