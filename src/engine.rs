mod engine_trait;
mod protocol_config;
mod protocol_engine;
mod protocol_error;
mod protocol_event;

pub use engine_trait::FrameEmit;
pub use protocol_config::ProtocolConfig;
pub use protocol_engine::ProtocolEngine;
pub use protocol_error::ProtocolError;
pub use protocol_event::{ProtocolEvent, ProtocolEvents};
