use crate::{
    constants::{BINARY_HEADER_FUNCTION_ID_MASK, BINARY_HEADER_RPC_TYPE_SHIFT, BINARY_HEADER_SIZE},
    frame::FrameDecodeError,
    message::RpcType,
};

/// Header embedded at the front of RPC and bulk-data payloads from protocol
/// version 2 on.
///
/// ```text
/// bits 31..28 : rpc_type
/// bits 27..0  : function_id
/// u32         : correlation_id
/// u32         : json_size
/// [json_size] : JSON bytes
/// [..]        : optional bulk bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFrameHeader {
    pub rpc_type: RpcType,

    /// Only the low 28 bits are transmitted; callers validate the range.
    pub function_id: u32,

    /// Pairs a response with the request that caused it.
    pub correlation_id: u32,

    pub json_size: u32,
}

impl BinaryFrameHeader {
    pub fn write(&self, buf: &mut Vec<u8>) {
        let word = ((self.rpc_type as u32) << BINARY_HEADER_RPC_TYPE_SHIFT)
            | (self.function_id & BINARY_HEADER_FUNCTION_ID_MASK);

        buf.extend(&word.to_be_bytes());
        buf.extend(&self.correlation_id.to_be_bytes());
        buf.extend(&self.json_size.to_be_bytes());
    }

    /// Parses the header and splits the remainder into JSON and bulk slices.
    pub fn parse(payload: &[u8]) -> Result<(Self, &[u8], &[u8]), FrameDecodeError> {
        if payload.len() < BINARY_HEADER_SIZE {
            return Err(FrameDecodeError::MalformedBinaryHeader);
        }

        let word = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let rpc_type = RpcType::try_from((word >> BINARY_HEADER_RPC_TYPE_SHIFT) as u8)
            .map_err(FrameDecodeError::UnknownRpcType)?;

        let correlation_id = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let json_size = u32::from_be_bytes([payload[8], payload[9], payload[10], payload[11]]);

        let body = &payload[BINARY_HEADER_SIZE..];
        if json_size as usize > body.len() {
            return Err(FrameDecodeError::MalformedBinaryHeader);
        }
        let (json, bulk) = body.split_at(json_size as usize);

        let header = Self {
            rpc_type,
            function_id: word & BINARY_HEADER_FUNCTION_ID_MASK,
            correlation_id,
            json_size,
        };

        Ok((header, json, bulk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_type_and_function_id_share_the_first_word() {
        let header = BinaryFrameHeader {
            rpc_type: RpcType::Notification,
            function_id: 0x0001_0002,
            correlation_id: 9,
            json_size: 2,
        };

        let mut buf = Vec::new();
        header.write(&mut buf);
        assert_eq!(&buf[0..4], &[0x20, 0x01, 0x00, 0x02]);

        buf.extend(b"{}tail");
        let (parsed, json, bulk) = BinaryFrameHeader::parse(&buf).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(json, b"{}");
        assert_eq!(bulk, b"tail");
    }

    #[test]
    fn json_size_past_the_end_is_rejected() {
        let header = BinaryFrameHeader {
            rpc_type: RpcType::Request,
            function_id: 1,
            correlation_id: 1,
            json_size: 100,
        };
        let mut buf = Vec::new();
        header.write(&mut buf);
        buf.extend(b"short");

        assert_eq!(
            BinaryFrameHeader::parse(&buf).unwrap_err(),
            FrameDecodeError::MalformedBinaryHeader
        );
    }
}
