use crate::constants::{CONSECUTIVE_FRAME_TERMINATOR, FIRST_FRAME_PAYLOAD_SIZE};
use crate::frame::{Frame, FrameCodec, FrameEncodeError, FrameHeader, FrameType, ServiceType};

/// Splits one serialized logical message into wire frames bounded by the MTU.
///
/// A payload that fits in a single frame goes out as one `Single` frame.
/// Anything larger becomes a `First` frame announcing the total size and
/// frame count, followed by `Consecutive` frames that are each filled to
/// capacity except the last, which carries the `0x00` terminator.
///
/// The fragmenter is stateless across messages; keeping fragments of two
/// messages from interleaving on one session is the session's job.
#[derive(Debug, Clone)]
pub struct FrameFragmenter {
    version: u8,
    service_type: ServiceType,
    session_id: u8,
    message_id: u32,
    capacity: usize,
}

impl FrameFragmenter {
    /// Creates a fragmenter for one message.
    ///
    /// Fails if `mtu` leaves no room for payload after the header.
    pub fn new(
        version: u8,
        mtu: usize,
        service_type: ServiceType,
        session_id: u8,
        message_id: u32,
    ) -> Result<Self, FrameEncodeError> {
        let header_size = FrameHeader::size_for_version(version);

        // The First frame payload must fit too
        if mtu < header_size + FIRST_FRAME_PAYLOAD_SIZE {
            return Err(FrameEncodeError::InvalidMtu { mtu, header_size });
        }

        Ok(Self {
            version,
            service_type,
            session_id,
            message_id,
            capacity: mtu - header_size,
        })
    }

    /// Payload bytes that fit in one frame.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn frame(&self, frame_type: FrameType, frame_info: u8, payload: Vec<u8>) -> Frame {
        Frame {
            version: self.version,
            encrypted: false,
            frame_type,
            service_type: self.service_type,
            frame_info,
            session_id: self.session_id,
            message_id: self.message_id,
            payload,
        }
    }

    /// Produces the ordered frame sequence for `payload`.
    pub fn fragment(&self, payload: &[u8]) -> Result<Vec<Frame>, FrameEncodeError> {
        if payload.len() > u32::MAX as usize {
            return Err(FrameEncodeError::PayloadTooLarge {
                size: payload.len(),
            });
        }

        if payload.len() <= self.capacity {
            return Ok(vec![self.frame(FrameType::Single, 0, payload.to_vec())]);
        }

        let frame_count = payload.len().div_ceil(self.capacity);

        let mut first_payload = Vec::with_capacity(FIRST_FRAME_PAYLOAD_SIZE);
        first_payload.extend(&(payload.len() as u32).to_be_bytes());
        first_payload.extend(&(frame_count as u32).to_be_bytes());

        let mut frames = Vec::with_capacity(frame_count + 1);
        frames.push(self.frame(FrameType::First, 0, first_payload));

        let mut seq: u8 = 0;
        for (i, chunk) in payload.chunks(self.capacity).enumerate() {
            let frame_info = if i + 1 == frame_count {
                CONSECUTIVE_FRAME_TERMINATOR
            } else {
                seq = next_sequence_number(seq);
                seq
            };

            frames.push(self.frame(FrameType::Consecutive, frame_info, chunk.to_vec()));
        }

        Ok(frames)
    }

    /// Fragments `payload` and hands each encoded frame to `on_emit`, in order.
    ///
    /// Returns the total number of bytes emitted.
    pub fn emit_payload<F>(&self, payload: &[u8], mut on_emit: F) -> Result<usize, FrameEncodeError>
    where
        F: FnMut(Vec<u8>),
    {
        let mut op_written_bytes = 0;

        for frame in self.fragment(payload)? {
            let bytes = FrameCodec::encode(&frame);
            op_written_bytes += bytes.len();
            on_emit(bytes);
        }

        Ok(op_written_bytes)
    }
}

/// 1, 2, ..., 255, 1, ... The terminator value is never produced.
fn next_sequence_number(current: u8) -> u8 {
    match current.wrapping_add(1) {
        CONSECUTIVE_FRAME_TERMINATOR => 1,
        next => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_wrap_past_the_terminator() {
        assert_eq!(next_sequence_number(0), 1);
        assert_eq!(next_sequence_number(254), 255);
        assert_eq!(next_sequence_number(255), 1);
    }

    #[test]
    fn long_messages_never_reuse_the_terminator_early() {
        let fragmenter = FrameFragmenter::new(2, 12 + 8, ServiceType::BulkData, 1, 1).unwrap();
        let payload = vec![0xAB; 8 * 300];

        let frames = fragmenter.fragment(&payload).unwrap();
        assert_eq!(frames.len(), 301);

        let consecutive = &frames[1..];
        assert!(consecutive[..299].iter().all(|f| f.frame_info != 0));
        assert_eq!(consecutive[254].frame_info, 255);
        assert_eq!(consecutive[255].frame_info, 1);
        assert!(consecutive[299].is_terminal());
    }

    #[test]
    fn mtu_smaller_than_header_is_rejected() {
        assert_eq!(
            FrameFragmenter::new(1, 10, ServiceType::Rpc, 1, 0).unwrap_err(),
            FrameEncodeError::InvalidMtu {
                mtu: 10,
                header_size: 8
            }
        );
    }
}
