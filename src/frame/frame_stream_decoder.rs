use crate::constants::{DEFAULT_MAX_FRAME_SIZE, FRAME_DATA_SIZE_OFFSET};
use crate::frame::{Frame, FrameCodec, FrameDecodeError, FrameHeader, frame_header::read_u32_be};
use std::collections::VecDeque;

/// Reconstructs whole frames from an arbitrarily chunked byte stream.
///
/// Transports hand over whatever their last read produced: half a header,
/// three frames and a bit, and so on. `FrameStreamDecoder` buffers the tail
/// of each chunk and yields every frame that has fully arrived, in arrival
/// order. It keeps no per-session state; that belongs to the reassembler.
///
/// ### Behavior Summary:
/// - A frame is decoded as soon as its header and declared payload are
///   buffered.
/// - A frame whose header is corrupt (bad frame or service type) is skipped
///   using its declared length and reported as an error.
/// - An unsupported version nibble or an oversized declared length means
///   frame boundaries can no longer be located; the buffer is discarded and
///   the error reported.
pub struct FrameStreamDecoder {
    buffer: Vec<u8>, // Holds partial frame data
    max_frame_size: usize,
}

pub struct FrameDecoderIterator {
    queue: VecDeque<Result<Frame, FrameDecodeError>>,
}

impl Iterator for FrameDecoderIterator {
    type Item = Result<Frame, FrameDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front()
    }
}

impl Default for FrameStreamDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameStreamDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_size,
        }
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partially received frame, e.g. after a reconnect.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    // Reads new bytes and attempts to decode them into frames
    pub fn read_bytes(&mut self, data: &[u8]) -> FrameDecoderIterator {
        self.buffer.extend_from_slice(data);
        let mut queue = VecDeque::new();

        while !self.buffer.is_empty() {
            let version = match FrameHeader::peek_version(&self.buffer) {
                Ok(version) => version,
                Err(e) => {
                    tracing::warn!(error = %e, dropped = self.buffer.len(), "Lost frame alignment");
                    self.buffer.clear();
                    queue.push_back(Err(e));
                    break;
                }
            };

            let header_size = FrameHeader::size_for_version(version);
            if self.buffer.len() < header_size {
                break;
            }

            let data_size = read_u32_be(&self.buffer, FRAME_DATA_SIZE_OFFSET) as usize;
            let total = header_size + data_size;

            if total > self.max_frame_size {
                let e = FrameDecodeError::FrameTooLarge {
                    size: total,
                    max: self.max_frame_size,
                };
                tracing::warn!(error = %e, "Discarding inbound buffer");
                self.buffer.clear();
                queue.push_back(Err(e));
                break;
            }

            if self.buffer.len() < total {
                break;
            }

            let result = FrameCodec::decode(&self.buffer[..total]);
            self.buffer.drain(..total);

            if let Ok(frame) = &result {
                tracing::trace!(
                    frame_type = ?frame.frame_type,
                    service_type = ?frame.service_type,
                    session_id = frame.session_id,
                    message_id = frame.message_id,
                    size = frame.payload.len(),
                    "Decoded frame"
                );
            }

            queue.push_back(result);
        }

        FrameDecoderIterator { queue }
    }
}
