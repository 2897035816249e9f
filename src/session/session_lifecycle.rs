use crate::{
    constants::{MAX_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION, PLACEHOLDER_SESSION_ID},
    engine::{ProtocolError, ProtocolEvent},
    frame::{ControlFrameInfo, Frame, ServiceType},
    session::{SendGuard, Session, SessionState},
    utils::generate_u32_id,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Side effects produced while handling a lifecycle operation.
///
/// The lifecycle manager never touches the transport or the reassembler
/// itself; the engine applies these once the handler returns.
#[derive(Debug, Default)]
pub struct ControlActions {
    /// Control frames to hand to the transport, in order.
    pub frames: Vec<Frame>,

    pub events: Vec<ProtocolEvent>,

    /// Sessions that became active.
    pub opened: Vec<u8>,

    /// Sessions that were torn down.
    pub closed: Vec<u8>,

    /// Closed send guards of torn-down sessions. A message already being
    /// fragmented must finish before any of `frames` go out.
    pub(crate) draining: Vec<Arc<SendGuard>>,
}

impl ControlActions {
    fn warn(&mut self, error: ProtocolError) {
        tracing::warn!(%error, "Protocol warning");
        self.events.push(ProtocolEvent::ProtocolError(error));
    }
}

#[derive(Debug, Clone, Copy)]
struct ServiceSlot {
    state: SessionState,
    session_id: Option<u8>,
}

/// Drives the start/end handshake of every logical session.
///
/// Sessions live in a 256-slot arena indexed by session id; slot 0 is never
/// occupied since `0` is the pre-handshake placeholder. Before a session id
/// is known, the pending handshake is tracked per service type.
///
/// The manager is symmetric: it can open sessions toward the peer (client
/// role) and answer the peer's StartSession requests (server role).
#[derive(Debug)]
pub struct SessionLifecycle {
    min_version: u8,
    max_version: u8,
    sessions: Vec<Option<Session>>,
    services: HashMap<ServiceType, ServiceSlot>,
}

impl SessionLifecycle {
    pub fn new(min_version: u8, max_version: u8) -> Self {
        let max_version = max_version.clamp(MIN_PROTOCOL_VERSION, MAX_PROTOCOL_VERSION);
        let min_version = min_version.clamp(MIN_PROTOCOL_VERSION, max_version);

        Self {
            min_version,
            max_version,
            sessions: vec![None; u8::MAX as usize + 1],
            services: HashMap::new(),
        }
    }

    pub fn session(&self, session_id: u8) -> Option<&Session> {
        self.sessions[session_id as usize].as_ref()
    }

    fn session_mut(&mut self, session_id: u8) -> Option<&mut Session> {
        self.sessions[session_id as usize].as_mut()
    }

    pub fn session_state(&self, session_id: u8) -> Option<SessionState> {
        self.session(session_id).map(|s| s.state)
    }

    pub fn service_state(&self, service_type: ServiceType) -> SessionState {
        self.services
            .get(&service_type)
            .map(|slot| slot.state)
            .unwrap_or(SessionState::Idle)
    }

    /// `(session_id, service_type)` of every session that may carry data.
    pub fn active_sessions(&self) -> Vec<(u8, ServiceType)> {
        self.sessions
            .iter()
            .flatten()
            .filter(|s| s.state == SessionState::Active)
            .map(|s| (s.session_id, s.service_type))
            .collect()
    }

    /// Whether inbound traffic for `session_id` should be processed.
    pub fn accepts_inbound(&self, session_id: u8) -> bool {
        matches!(
            self.session_state(session_id),
            Some(SessionState::Active | SessionState::AwaitingEndAck)
        )
    }

    /// Send guard and negotiated version of an active session.
    pub fn sendable(&self, session_id: u8) -> Result<(Arc<SendGuard>, u8), ProtocolError> {
        match self.session(session_id) {
            Some(session) if session.state == SessionState::Active => {
                Ok((session.send_guard.clone(), session.negotiated_version))
            }
            Some(session) => Err(ProtocolError::ProtocolViolation(format!(
                "session {session_id} is {:?}, not Active",
                session.state
            ))),
            None => Err(ProtocolError::ProtocolViolation(format!(
                "no handshake has completed for session {session_id}"
            ))),
        }
    }

    fn lowest_free_session_id(&self) -> Option<u8> {
        (1..=u8::MAX).find(|id| self.sessions[*id as usize].is_none())
    }

    fn is_free(&self, session_id: u8) -> bool {
        session_id != PLACEHOLDER_SESSION_ID && self.sessions[session_id as usize].is_none()
    }

    fn open_session(
        &mut self,
        session_id: u8,
        service_type: ServiceType,
        version: u8,
        token: u32,
        out: &mut ControlActions,
    ) {
        tracing::debug!(session_id, ?service_type, version, "Session active");

        self.sessions[session_id as usize] =
            Some(Session::new(session_id, service_type, version, token));
        self.services.insert(
            service_type,
            ServiceSlot {
                state: SessionState::Active,
                session_id: Some(session_id),
            },
        );

        out.opened.push(session_id);
        out.events.push(ProtocolEvent::SessionStarted {
            service_type,
            session_id,
            version,
        });
    }

    fn teardown(&mut self, session_id: u8, out: &mut ControlActions) {
        let Some(session) = self.sessions[session_id as usize].take() else {
            return;
        };

        session.send_guard.close();

        if let Some(slot) = self.services.get_mut(&session.service_type) {
            if slot.session_id == Some(session_id) {
                slot.state = SessionState::Closed;
                slot.session_id = None;
            }
        }

        tracing::debug!(session_id, service_type = ?session.service_type, "Session closed");

        out.draining.push(session.send_guard.clone());
        out.closed.push(session_id);
        out.events.push(ProtocolEvent::SessionEnded {
            service_type: session.service_type,
            session_id,
        });
    }

    /// Begins the handshake for `service_type` (client role).
    pub fn start(
        &mut self,
        service_type: ServiceType,
        params: Vec<u8>,
        out: &mut ControlActions,
    ) -> Result<(), ProtocolError> {
        if !service_type.is_data_service() {
            return Err(ProtocolError::ProtocolViolation(format!(
                "{service_type:?} cannot be opened as a session"
            )));
        }

        let state = self.service_state(service_type);
        if !state.can_start() {
            return Err(ProtocolError::ProtocolViolation(format!(
                "{service_type:?} session is already {state:?}"
            )));
        }

        self.services.insert(
            service_type,
            ServiceSlot {
                state: SessionState::AwaitingStartAck,
                session_id: None,
            },
        );

        tracing::debug!(?service_type, version = self.max_version, "Requesting session");

        out.frames.push(
            Frame::control(
                self.max_version,
                service_type,
                ControlFrameInfo::StartSession,
                PLACEHOLDER_SESSION_ID,
                0,
            )
            .with_payload(params),
        );

        Ok(())
    }

    /// Moves an active session to `AwaitingEndAck` and builds its EndSession
    /// frame. The caller sends the frame under the returned guard so it
    /// cannot split a fragmented message.
    pub fn prepare_end(&mut self, session_id: u8) -> Result<(Arc<SendGuard>, Frame), ProtocolError> {
        let Some(session) = self.session_mut(session_id) else {
            return Err(ProtocolError::ProtocolViolation(format!(
                "cannot end unknown session {session_id}"
            )));
        };

        if session.state != SessionState::Active {
            return Err(ProtocolError::ProtocolViolation(format!(
                "cannot end session {session_id} while {:?}",
                session.state
            )));
        }

        session.state = SessionState::AwaitingEndAck;

        let token = if session.negotiated_version >= 2 {
            session.validation_token
        } else {
            0
        };

        let frame = Frame::control(
            session.negotiated_version,
            session.service_type,
            ControlFrameInfo::EndSession,
            session_id,
            token,
        );
        let guard = session.send_guard.clone();
        let service_type = session.service_type;

        if let Some(slot) = self.services.get_mut(&service_type) {
            slot.state = SessionState::AwaitingEndAck;
        }

        Ok((guard, frame))
    }

    /// Peer asks to open a session (server role).
    pub fn on_start_session(&mut self, frame: &Frame, out: &mut ControlActions) {
        let service_type = frame.service_type;
        let version = frame.version.min(self.max_version);

        let nack = |reason: &str, out: &mut ControlActions| {
            tracing::debug!(?service_type, reason, "Refusing peer session");
            out.frames.push(
                Frame::control(
                    version,
                    service_type,
                    ControlFrameInfo::StartSessionNack,
                    frame.session_id,
                    0,
                )
                .with_payload(reason.as_bytes().to_vec()),
            );
        };

        if !service_type.is_data_service() {
            return nack("service cannot be opened", out);
        }

        if version < self.min_version {
            return nack("protocol version not supported", out);
        }

        if !self.service_state(service_type).can_start() {
            return nack("service already in use", out);
        }

        let session_id = if self.is_free(frame.session_id) {
            frame.session_id
        } else {
            match self.lowest_free_session_id() {
                Some(id) => id,
                None => return nack("no free session id", out),
            }
        };

        let token = if version >= 2 { generate_u32_id() } else { 0 };

        out.frames.push(Frame::control(
            version,
            service_type,
            ControlFrameInfo::StartSessionAck,
            session_id,
            token,
        ));

        self.open_session(session_id, service_type, version, token, out);
    }

    /// Peer accepted a session: either ours, or one it is opening toward us.
    pub fn on_start_ack(&mut self, frame: &Frame, out: &mut ControlActions) {
        let service_type = frame.service_type;
        let session_id = frame.session_id;
        let version = frame.version;
        let token = if version >= 2 { frame.message_id } else { 0 };

        let pending = self.service_state(service_type) == SessionState::AwaitingStartAck;

        if !pending && !self.service_state(service_type).can_start() {
            return out.warn(ProtocolError::ProtocolViolation(format!(
                "duplicate StartSessionACK for {service_type:?} session {session_id}"
            )));
        }

        let failure = if !service_type.is_data_service() {
            Some(format!("{service_type:?} cannot carry a session"))
        } else if !(self.min_version..=self.max_version).contains(&version) {
            Some(format!("peer negotiated unsupported version {version}"))
        } else if !self.is_free(session_id) {
            Some(format!("peer assigned unusable session id {session_id}"))
        } else {
            None
        };

        if let Some(reason) = failure {
            if pending {
                self.services.insert(
                    service_type,
                    ServiceSlot {
                        state: SessionState::Failed,
                        session_id: None,
                    },
                );
            }
            return out.warn(ProtocolError::ProtocolViolation(reason));
        }

        if !pending {
            tracing::debug!(?service_type, session_id, "Adopting peer-initiated session");
            out.frames.push(Frame::control(
                version,
                service_type,
                ControlFrameInfo::StartSessionAck,
                session_id,
                token,
            ));
        }

        self.open_session(session_id, service_type, version, token, out);
    }

    pub fn on_start_nack(&mut self, frame: &Frame, out: &mut ControlActions) {
        let service_type = frame.service_type;

        if self.service_state(service_type) != SessionState::AwaitingStartAck {
            return out.warn(ProtocolError::ProtocolViolation(format!(
                "unexpected StartSessionNACK for {service_type:?}"
            )));
        }

        let reason = String::from_utf8_lossy(&frame.payload).into_owned();

        if service_type.is_renegotiable() {
            // Caller may retry with different streaming parameters
            self.services.remove(&service_type);
            tracing::info!(?service_type, %reason, "Session start rejected; renegotiation possible");
            out.events.push(ProtocolEvent::SessionStartFailed {
                service_type,
                reason,
            });
            return;
        }

        self.services.insert(
            service_type,
            ServiceSlot {
                state: SessionState::Failed,
                session_id: None,
            },
        );

        let error = ProtocolError::HandshakeRejected {
            service_type,
            reason,
        };
        tracing::error!(%error, "Session start failed");
        out.events.push(ProtocolEvent::ProtocolError(error));
    }

    /// Peer asks to end a session.
    pub fn on_end_session(&mut self, frame: &Frame, out: &mut ControlActions) {
        let session_id = frame.session_id;

        let Some(session) = self.session(session_id) else {
            return out.warn(ProtocolError::ProtocolViolation(format!(
                "EndSession for unknown session {session_id}"
            )));
        };

        if !session.accepts_token(frame.message_id) {
            return out.warn(ProtocolError::ProtocolViolation(format!(
                "EndSession token mismatch on session {session_id}"
            )));
        }

        out.frames.push(Frame::control(
            session.negotiated_version,
            session.service_type,
            ControlFrameInfo::EndSessionAck,
            session_id,
            frame.message_id,
        ));

        self.teardown(session_id, out);
    }

    pub fn on_end_ack(&mut self, frame: &Frame, out: &mut ControlActions) {
        let session_id = frame.session_id;

        let Some(session) = self.session(session_id) else {
            return out.warn(ProtocolError::ProtocolViolation(format!(
                "EndSessionACK for unknown session {session_id}"
            )));
        };

        if !session.accepts_token(frame.message_id) {
            return out.warn(ProtocolError::ProtocolViolation(format!(
                "EndSessionACK token mismatch on session {session_id}"
            )));
        }

        self.teardown(session_id, out);
    }

    pub fn on_end_nack(&mut self, frame: &Frame, out: &mut ControlActions) {
        let session_id = frame.session_id;

        let Some(session) = self.session_mut(session_id) else {
            return out.warn(ProtocolError::ProtocolViolation(format!(
                "EndSessionNACK for unknown session {session_id}"
            )));
        };

        if session.state == SessionState::AwaitingEndAck {
            session.state = SessionState::Active;
            session.send_guard.reopen();
            let service_type = session.service_type;
            if let Some(slot) = self.services.get_mut(&service_type) {
                slot.state = SessionState::Active;
            }
        }

        out.warn(ProtocolError::ProtocolViolation(format!(
            "peer refused to end session {session_id}"
        )));
    }

    /// Connection loss: every session is closed and pending handshakes are
    /// forgotten.
    pub fn reset(&mut self, out: &mut ControlActions) {
        for session_id in 1..=u8::MAX {
            self.teardown(session_id, out);
        }

        self.services
            .retain(|_, slot| slot.state != SessionState::AwaitingStartAck);
    }
}
