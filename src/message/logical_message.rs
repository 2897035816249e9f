use crate::{
    constants::{BINARY_HEADER_FUNCTION_ID_MASK, BINARY_HEADER_SIZE},
    frame::{FrameDecodeError, FrameEncodeError, ServiceType},
    message::{BinaryFrameHeader, RpcType},
};

/// One complete application-level request, response, notification or
/// stream chunk, independent of how many frames it spans on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalMessage {
    pub service_type: ServiceType,

    pub session_id: u8,

    /// On inbound messages, the version of the frames that carried it.
    /// Ignored on send; the session's negotiated version is used instead.
    pub version: u8,

    pub rpc_type: RpcType,

    pub function_id: u32,

    pub correlation_id: u32,

    pub json_payload: Vec<u8>,

    /// Trailing binary data (RPC/bulk), or the raw bytes of a stream chunk.
    pub bulk_payload: Option<Vec<u8>>,
}

impl LogicalMessage {
    pub fn rpc(
        session_id: u8,
        rpc_type: RpcType,
        function_id: u32,
        correlation_id: u32,
        json_payload: Vec<u8>,
    ) -> Self {
        Self {
            service_type: ServiceType::Rpc,
            session_id,
            version: 0,
            rpc_type,
            function_id,
            correlation_id,
            json_payload,
            bulk_payload: None,
        }
    }

    /// A chunk of raw streaming data (audio, video/nav).
    pub fn stream_data(service_type: ServiceType, session_id: u8, bytes: Vec<u8>) -> Self {
        Self {
            service_type,
            session_id,
            version: 0,
            rpc_type: RpcType::Notification,
            function_id: 0,
            correlation_id: 0,
            json_payload: Vec::new(),
            bulk_payload: Some(bytes),
        }
    }

    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn with_bulk(mut self, bulk: Vec<u8>) -> Self {
        self.bulk_payload = Some(bulk);
        self
    }

    fn uses_binary_header(service_type: ServiceType, version: u8) -> bool {
        version >= 2 && service_type.carries_binary_header()
    }

    /// Serializes the message into the byte sequence that gets fragmented.
    pub fn to_payload(&self, version: u8) -> Result<Vec<u8>, FrameEncodeError> {
        let bulk = self.bulk_payload.as_deref().unwrap_or_default();

        if Self::uses_binary_header(self.service_type, version) {
            if self.function_id & !BINARY_HEADER_FUNCTION_ID_MASK != 0 {
                return Err(FrameEncodeError::FunctionIdOutOfRange {
                    function_id: self.function_id,
                });
            }

            let json_size = u32::try_from(self.json_payload.len()).map_err(|_| {
                FrameEncodeError::PayloadTooLarge {
                    size: self.json_payload.len(),
                }
            })?;

            let mut buf =
                Vec::with_capacity(BINARY_HEADER_SIZE + self.json_payload.len() + bulk.len());

            BinaryFrameHeader {
                rpc_type: self.rpc_type,
                function_id: self.function_id,
                correlation_id: self.correlation_id,
                json_size,
            }
            .write(&mut buf);

            buf.extend(&self.json_payload);
            buf.extend(bulk);

            return Ok(buf);
        }

        if self.service_type.carries_binary_header() {
            // Version 1 RPC: the payload is the JSON and nothing else
            if !bulk.is_empty() {
                return Err(FrameEncodeError::BulkRequiresBinaryHeader { version });
            }
            return Ok(self.json_payload.clone());
        }

        let mut buf = Vec::with_capacity(self.json_payload.len() + bulk.len());
        buf.extend(&self.json_payload);
        buf.extend(bulk);
        Ok(buf)
    }

    /// Rebuilds a message from a fully reassembled payload.
    pub fn from_payload(
        service_type: ServiceType,
        session_id: u8,
        version: u8,
        payload: Vec<u8>,
    ) -> Result<Self, FrameDecodeError> {
        if Self::uses_binary_header(service_type, version) {
            let (header, json, bulk) = BinaryFrameHeader::parse(&payload)?;

            return Ok(Self {
                service_type,
                session_id,
                version,
                rpc_type: header.rpc_type,
                function_id: header.function_id,
                correlation_id: header.correlation_id,
                json_payload: json.to_vec(),
                bulk_payload: (!bulk.is_empty()).then(|| bulk.to_vec()),
            });
        }

        let (json_payload, bulk_payload) = if service_type.carries_binary_header() {
            (payload, None)
        } else {
            (Vec::new(), Some(payload))
        };

        Ok(Self {
            service_type,
            session_id,
            version,
            rpc_type: RpcType::Notification,
            function_id: 0,
            correlation_id: 0,
            json_payload,
            bulk_payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_rpc_payload_starts_with_binary_header() {
        let msg = LogicalMessage::rpc(7, RpcType::Request, 10, 5, vec![b'x'; 100]);
        let payload = msg.to_payload(2).unwrap();

        assert_eq!(payload.len(), BINARY_HEADER_SIZE + 100);
        assert_eq!(&payload[0..4], &10u32.to_be_bytes());
        assert_eq!(&payload[4..8], &5u32.to_be_bytes());
        assert_eq!(&payload[8..12], &100u32.to_be_bytes());

        let parsed = LogicalMessage::from_payload(ServiceType::Rpc, 7, 2, payload).unwrap();
        assert_eq!(parsed.function_id, 10);
        assert_eq!(parsed.correlation_id, 5);
        assert_eq!(parsed.json_payload, vec![b'x'; 100]);
        assert_eq!(parsed.bulk_payload, None);
    }

    #[test]
    fn v1_rpc_payload_is_raw_json() {
        let msg = LogicalMessage::rpc(1, RpcType::Request, 10, 5, b"{\"a\":1}".to_vec());
        assert_eq!(msg.to_payload(1).unwrap(), b"{\"a\":1}");

        let with_bulk = msg.with_bulk(vec![1, 2, 3]);
        assert_eq!(
            with_bulk.to_payload(1).unwrap_err(),
            FrameEncodeError::BulkRequiresBinaryHeader { version: 1 }
        );
    }

    #[test]
    fn stream_data_skips_binary_header_on_every_version() {
        let msg = LogicalMessage::stream_data(ServiceType::NAV, 3, vec![0u8; 32]);
        assert_eq!(msg.to_payload(3).unwrap().len(), 32);

        let parsed =
            LogicalMessage::from_payload(ServiceType::Video, 3, 3, vec![0u8; 32]).unwrap();
        assert_eq!(parsed.bulk_payload, Some(vec![0u8; 32]));
        assert!(parsed.json_payload.is_empty());
    }

    #[test]
    fn function_id_wider_than_28_bits_is_refused() {
        let largest = LogicalMessage::rpc(7, RpcType::Request, 0x0FFF_FFFF, 5, b"{}".to_vec());
        let payload = largest.to_payload(2).unwrap();
        let parsed = LogicalMessage::from_payload(ServiceType::Rpc, 7, 2, payload).unwrap();
        assert_eq!(parsed.function_id, 0x0FFF_FFFF);

        let msg = LogicalMessage::rpc(7, RpcType::Request, 0x1000_0001, 5, b"{}".to_vec());
        assert_eq!(
            msg.to_payload(2).unwrap_err(),
            FrameEncodeError::FunctionIdOutOfRange {
                function_id: 0x1000_0001
            }
        );
    }
}
