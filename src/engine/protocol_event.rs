use crate::{engine::ProtocolError, frame::ServiceType, message::LogicalMessage};
use std::collections::VecDeque;
use std::time::Duration;

/// Notifications delivered to the layer above the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// A complete logical message arrived.
    Message(LogicalMessage),

    SessionStarted {
        service_type: ServiceType,
        session_id: u8,
        version: u8,
    },

    SessionEnded {
        service_type: ServiceType,
        session_id: u8,
    },

    /// The peer refused a renegotiable (Video/Nav) session. The caller may
    /// try again with different parameters.
    SessionStartFailed {
        service_type: ServiceType,
        reason: String,
    },

    ProtocolError(ProtocolError),

    /// Nothing was received on the session for `timeout`. Reported once per
    /// silence; reconnection is up to the caller.
    HeartbeatTimeout { session_id: u8, timeout: Duration },
}

/// Events produced by one engine call, in the order they occurred.
#[derive(Debug, Default)]
pub struct ProtocolEvents {
    queue: VecDeque<ProtocolEvent>,
}

impl ProtocolEvents {
    pub(crate) fn push(&mut self, event: ProtocolEvent) {
        self.queue.push_back(event);
    }

    pub(crate) fn extend<I: IntoIterator<Item = ProtocolEvent>>(&mut self, events: I) {
        self.queue.extend(events);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Iterator for ProtocolEvents {
    type Item = ProtocolEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front()
    }
}
