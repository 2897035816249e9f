use crate::frame::{Frame, FrameDecodeError, FrameHeader};

/// Provides encoding and decoding functionality for frames.
///
/// The `FrameCodec` serializes a [`Frame`] into its wire bytes and parses
/// wire bytes back into a [`Frame`]. It is a pure transform: it neither
/// buffers partial input nor interprets payload semantics.
pub struct FrameCodec;

impl FrameCodec {
    /// Encodes a `Frame` into a byte vector.
    ///
    /// The header shape always follows `frame.version`: 8 bytes for version 1,
    /// 12 bytes (with the message id) for version 2 and later.
    pub fn encode(frame: &Frame) -> Vec<u8> {
        let header = frame.header();
        let mut buf = Vec::with_capacity(header.size() + frame.payload.len());

        header.write(&mut buf);
        buf.extend(&frame.payload);

        buf
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Returns `IncompleteHeader` or `IncompletePayload` when `buf` is shorter
    /// than the frame it starts; the caller is expected to retry once more
    /// bytes have arrived. Bytes past the end of the frame are ignored.
    pub fn decode(buf: &[u8]) -> Result<Frame, FrameDecodeError> {
        let header = FrameHeader::parse(buf)?;
        let total = header.frame_len();

        if buf.len() < total {
            return Err(FrameDecodeError::IncompletePayload {
                needed: total,
                available: buf.len(),
            });
        }

        let fields = header.fields();

        Ok(Frame {
            version: fields.version,
            encrypted: fields.encrypted,
            frame_type: fields.frame_type,
            service_type: fields.service_type,
            frame_info: fields.frame_info,
            session_id: fields.session_id,
            message_id: header.message_id(),
            payload: buf[header.size()..total].to_vec(),
        })
    }
}
