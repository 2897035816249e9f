use crate::{
    constants::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_MTU, MAX_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION},
    frame::ReassemblyLimits,
    session::HeartbeatConfig,
};
use std::time::Duration;

/// Engine configuration. Start from [`Default`] and adjust with the
/// `with_*` builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Maximum size of one outbound frame, header included.
    pub mtu: usize,

    pub min_version: u8,

    /// Version requested in StartSession and the ceiling for negotiation.
    pub max_version: u8,

    /// `None` disables heartbeats.
    pub heartbeat: Option<HeartbeatConfig>,

    pub reassembly: ReassemblyLimits,

    /// Largest inbound frame the stream decoder will buffer.
    pub max_frame_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            min_version: MIN_PROTOCOL_VERSION,
            max_version: MAX_PROTOCOL_VERSION,
            heartbeat: Some(HeartbeatConfig::default()),
            reassembly: ReassemblyLimits::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ProtocolConfig {
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn with_versions(mut self, min_version: u8, max_version: u8) -> Self {
        self.min_version = min_version;
        self.max_version = max_version;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Option<HeartbeatConfig>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.reassembly.max_message_size = max_message_size;
        self
    }

    pub fn with_max_reassembly_contexts(mut self, max_contexts: usize) -> Self {
        self.reassembly.max_contexts = max_contexts;
        self
    }

    pub fn with_reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.reassembly.timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}
