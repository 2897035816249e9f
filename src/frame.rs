mod frame_codec;
mod frame_error;
mod frame_fragmenter;
mod frame_header;
mod frame_reassembler;
mod frame_stream_decoder;
mod frame_struct;
mod frame_type;

pub use frame_codec::FrameCodec;
pub use frame_error::{FrameDecodeError, FrameEncodeError};
pub use frame_fragmenter::FrameFragmenter;
pub use frame_header::{FrameHeader, HeaderFields};
pub use frame_reassembler::{FrameReassembler, ReassemblyLimits, ReassemblyOutcome};
pub use frame_stream_decoder::{FrameDecoderIterator, FrameStreamDecoder};
pub use frame_struct::Frame;
pub use frame_type::{ControlFrameInfo, FrameType, ServiceType};
