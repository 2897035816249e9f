use crate::{
    constants::{DEFAULT_HEARTBEAT_RECEIVE_INTERVAL, DEFAULT_HEARTBEAT_SEND_INTERVAL},
    engine::ProtocolError,
    frame::{ControlFrameInfo, Frame},
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Heartbeat timing. Disabled entirely when the engine is configured
/// without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// How long a session may stay quiet before we send a Heartbeat.
    pub send_interval: Duration,

    /// How long without any inbound frame before the session is declared
    /// dead.
    pub receive_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_HEARTBEAT_SEND_INTERVAL,
            receive_interval: DEFAULT_HEARTBEAT_RECEIVE_INTERVAL,
        }
    }
}

#[derive(Debug)]
struct Liveness {
    last_sent: Instant,
    last_received: Instant,
    timed_out: bool,
}

/// Result of one [`HeartbeatMonitor::poll`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeartbeatPoll {
    /// Sessions that need a Heartbeat sent now.
    pub due: Vec<u8>,

    pub expired: Vec<ProtocolError>,
}

/// Tracks per-session liveness in both directions.
///
/// Time is always supplied by the caller, so the monitor can be driven by a
/// real clock or stepped manually in tests. A session that times out is
/// reported once; it is not torn down here.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    config: Option<HeartbeatConfig>,
    sessions: HashMap<u8, Liveness>,
}

impl HeartbeatMonitor {
    pub fn new(config: Option<HeartbeatConfig>) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub fn register(&mut self, session_id: u8, now: Instant) {
        if self.config.is_none() {
            return;
        }

        self.sessions.insert(
            session_id,
            Liveness {
                last_sent: now,
                last_received: now,
                timed_out: false,
            },
        );
    }

    pub fn remove(&mut self, session_id: u8) {
        self.sessions.remove(&session_id);
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Any inbound frame counts as proof of life.
    pub fn record_inbound(&mut self, session_id: u8, now: Instant) {
        if let Some(liveness) = self.sessions.get_mut(&session_id) {
            liveness.last_received = now;
            liveness.timed_out = false;
        }
    }

    /// Builds the HeartbeatACK answering the peer's Heartbeat.
    pub fn on_heartbeat(&self, frame: &Frame) -> Frame {
        Frame::control(
            frame.version,
            frame.service_type,
            ControlFrameInfo::HeartbeatAck,
            frame.session_id,
            frame.message_id,
        )
    }

    pub fn on_heartbeat_ack(&mut self, session_id: u8, now: Instant) {
        tracing::trace!(session_id, "HeartbeatACK received");
        self.record_inbound(session_id, now);
    }

    /// Marks that a Heartbeat was just sent on `session_id`.
    pub fn record_sent(&mut self, session_id: u8, now: Instant) {
        if let Some(liveness) = self.sessions.get_mut(&session_id) {
            liveness.last_sent = now;
        }
    }

    pub fn poll(&mut self, now: Instant) -> HeartbeatPoll {
        let mut result = HeartbeatPoll::default();

        let Some(config) = self.config else {
            return result;
        };

        for (session_id, liveness) in self.sessions.iter_mut() {
            let quiet_for = now.saturating_duration_since(liveness.last_received);

            if quiet_for >= config.receive_interval {
                if !liveness.timed_out {
                    liveness.timed_out = true;
                    result.expired.push(ProtocolError::LivenessTimeout {
                        session_id: *session_id,
                        timeout: config.receive_interval,
                    });
                }
                continue;
            }

            if now.saturating_duration_since(liveness.last_sent) >= config.send_interval {
                result.due.push(*session_id);
            }
        }

        result.due.sort_unstable();

        result
    }
}
