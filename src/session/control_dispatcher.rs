use crate::{
    engine::{ProtocolError, ProtocolEvent},
    frame::{ControlFrameInfo, Frame},
    session::{ControlActions, HeartbeatMonitor, SessionLifecycle},
};
use std::time::Instant;

/// Routes inbound Control frames by subtype.
///
/// Handshake subtypes go to the [`SessionLifecycle`], keep-alive subtypes
/// to the [`HeartbeatMonitor`]. Unrecognized subtypes are reported and
/// otherwise ignored.
pub struct ControlFrameDispatcher;

impl ControlFrameDispatcher {
    pub fn dispatch(
        frame: &Frame,
        lifecycle: &mut SessionLifecycle,
        heartbeat: &mut HeartbeatMonitor,
        now: Instant,
        out: &mut ControlActions,
    ) {
        let info = match frame.control_info() {
            Ok(info) => info,
            Err(code) => {
                let error = ProtocolError::UnknownControlFrame {
                    session_id: frame.session_id,
                    code,
                };
                tracing::warn!(%error, "Ignoring control frame");
                out.events.push(ProtocolEvent::ProtocolError(error));
                return;
            }
        };

        tracing::trace!(
            ?info,
            service_type = ?frame.service_type,
            session_id = frame.session_id,
            "Control frame"
        );

        match info {
            ControlFrameInfo::StartSession => lifecycle.on_start_session(frame, out),
            ControlFrameInfo::StartSessionAck => lifecycle.on_start_ack(frame, out),
            ControlFrameInfo::StartSessionNack => lifecycle.on_start_nack(frame, out),
            ControlFrameInfo::EndSession => lifecycle.on_end_session(frame, out),
            ControlFrameInfo::EndSessionAck => lifecycle.on_end_ack(frame, out),
            ControlFrameInfo::EndSessionNack => lifecycle.on_end_nack(frame, out),
            ControlFrameInfo::Heartbeat => out.frames.push(heartbeat.on_heartbeat(frame)),
            ControlFrameInfo::HeartbeatAck => heartbeat.on_heartbeat_ack(frame.session_id, now),
        }
    }
}
