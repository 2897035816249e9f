use crate::{
    engine::{FrameEmit, ProtocolConfig, ProtocolError, ProtocolEvent, ProtocolEvents},
    frame::{
        ControlFrameInfo, Frame, FrameCodec, FrameFragmenter, FrameReassembler, FrameStreamDecoder,
        FrameType, ReassemblyOutcome, ServiceType,
    },
    message::LogicalMessage,
    session::{
        ControlActions, ControlFrameDispatcher, HeartbeatMonitor, SessionLifecycle, SessionState,
    },
};
use parking_lot::Mutex;
use std::time::Instant;

struct InboundState {
    decoder: FrameStreamDecoder,
    reassembler: FrameReassembler,
}

struct SessionTable {
    lifecycle: SessionLifecycle,
    heartbeat: HeartbeatMonitor,
}

impl SessionTable {
    /// Keeps heartbeat tracking and reassembly in step with sessions that
    /// just opened or closed.
    fn apply_transitions(
        &mut self,
        actions: &ControlActions,
        reassembler: &mut FrameReassembler,
        now: Instant,
    ) {
        for session_id in &actions.opened {
            self.heartbeat.register(*session_id, now);
        }

        for session_id in &actions.closed {
            self.heartbeat.remove(*session_id);

            let purged = reassembler.purge_session(*session_id);
            if purged > 0 {
                tracing::debug!(session_id, purged, "Purged in-flight messages");
            }
        }
    }
}

/// The wire protocol engine for one physical connection.
///
/// Bytes from the transport go in through [`read_bytes`](Self::read_bytes)
/// and come back out as [`ProtocolEvent`]s; outbound frames leave through
/// the emit callback supplied at construction, one call per frame.
///
/// The engine is `Send + Sync` and is meant to be shared behind an `Arc`:
/// one reader flow calls `read_bytes`, while any number of threads may call
/// [`send`](Self::send) concurrently. Fragments of one message are never
/// interleaved with another message on the same session.
///
/// Locks are always taken in the order inbound, then session table, then a
/// session's send guard; the session table lock is released before any send
/// guard is acquired.
pub struct ProtocolEngine {
    config: ProtocolConfig,
    emit: Box<dyn FrameEmit>,
    inbound: Mutex<InboundState>,
    sessions: Mutex<SessionTable>,
}

impl ProtocolEngine {
    pub fn new<E>(config: ProtocolConfig, emit: E) -> Self
    where
        E: FrameEmit + 'static,
    {
        Self {
            inbound: Mutex::new(InboundState {
                decoder: FrameStreamDecoder::new(config.max_frame_size),
                reassembler: FrameReassembler::new(config.reassembly),
            }),
            sessions: Mutex::new(SessionTable {
                lifecycle: SessionLifecycle::new(config.min_version, config.max_version),
                heartbeat: HeartbeatMonitor::new(config.heartbeat),
            }),
            config,
            emit: Box::new(emit),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn emit_frame(&self, frame: &Frame) -> usize {
        let bytes = FrameCodec::encode(frame);
        let len = bytes.len();
        tracing::trace!(
            frame_type = ?frame.frame_type,
            service_type = ?frame.service_type,
            session_id = frame.session_id,
            len,
            "Emitting frame"
        );
        (self.emit)(bytes);
        len
    }

    fn emit_frames(&self, frames: &[Frame]) {
        for frame in frames {
            self.emit_frame(frame);
        }
    }

    /// Feeds transport bytes into the engine using the current time.
    pub fn read_bytes(&self, bytes: &[u8]) -> ProtocolEvents {
        self.read_bytes_at(bytes, Instant::now())
    }

    /// Feeds transport bytes into the engine.
    ///
    /// Control frames are answered through the emit callback before this
    /// returns. Completed messages, session transitions and warnings come
    /// back as events, in arrival order.
    pub fn read_bytes_at(&self, bytes: &[u8], now: Instant) -> ProtocolEvents {
        let mut events = ProtocolEvents::default();
        let mut inbound = self.inbound.lock();
        let InboundState {
            decoder,
            reassembler,
        } = &mut *inbound;

        for frame_result in decoder.read_bytes(bytes) {
            let frame = match frame_result {
                Ok(frame) => frame,
                Err(e) => {
                    events.push(ProtocolEvent::ProtocolError(e.into()));
                    continue;
                }
            };

            tracing::trace!(
                frame_type = ?frame.frame_type,
                service_type = ?frame.service_type,
                session_id = frame.session_id,
                message_id = frame.message_id,
                len = frame.payload.len(),
                "Received frame"
            );

            if frame.frame_type == FrameType::Control {
                let mut actions = ControlActions::default();
                {
                    let mut table = self.sessions.lock();
                    table.heartbeat.record_inbound(frame.session_id, now);

                    let SessionTable {
                        lifecycle,
                        heartbeat,
                    } = &mut *table;
                    ControlFrameDispatcher::dispatch(&frame, lifecycle, heartbeat, now, &mut actions);

                    table.apply_transitions(&actions, reassembler, now);
                }

                // An EndSessionACK must not overtake the tail of a message
                for guard in &actions.draining {
                    guard.wait_idle();
                }

                self.emit_frames(&actions.frames);
                events.extend(actions.events);
                continue;
            }

            let accepted = {
                let mut table = self.sessions.lock();
                table.heartbeat.record_inbound(frame.session_id, now);

                table
                    .lifecycle
                    .session(frame.session_id)
                    .is_some_and(|s| s.service_type == frame.service_type)
                    && table.lifecycle.accepts_inbound(frame.session_id)
            };

            if !accepted {
                let error = ProtocolError::ProtocolViolation(format!(
                    "{:?} data frame on session {} without an active handshake",
                    frame.service_type, frame.session_id
                ));
                tracing::warn!(%error, "Dropping frame");
                events.push(ProtocolEvent::ProtocolError(error));
                continue;
            }

            match reassembler.accept(frame, now) {
                ReassemblyOutcome::Pending => {}
                ReassemblyOutcome::Complete(msg) => {
                    tracing::debug!(
                        service_type = ?msg.service_type,
                        session_id = msg.session_id,
                        "Message received"
                    );
                    events.push(ProtocolEvent::Message(msg));
                }
                ReassemblyOutcome::Displaced(error) | ReassemblyOutcome::Dropped(error) => {
                    tracing::warn!(%error, "Reassembly warning");
                    events.push(ProtocolEvent::ProtocolError(error));
                }
            }
        }

        events
    }

    /// Fragments and emits one logical message on its session.
    ///
    /// Fails if the session has not completed its handshake, is closing, or
    /// belongs to a different service. Returns the number of bytes emitted.
    pub fn send(&self, msg: &LogicalMessage) -> Result<usize, ProtocolError> {
        let (guard, version) = {
            let table = self.sessions.lock();

            if let Some(session) = table.lifecycle.session(msg.session_id) {
                if session.service_type != msg.service_type {
                    return Err(ProtocolError::ProtocolViolation(format!(
                        "session {} carries {:?}, not {:?}",
                        msg.session_id, session.service_type, msg.service_type
                    )));
                }
            }

            table.lifecycle.sendable(msg.session_id)?
        };

        let payload = msg.to_payload(version)?;

        let mut lock = guard.lock()?;
        let message_id = lock.next_message_id();

        let fragmenter = FrameFragmenter::new(
            version,
            self.config.mtu,
            msg.service_type,
            msg.session_id,
            message_id,
        )?;

        let written = fragmenter.emit_payload(&payload, |bytes| (self.emit)(bytes))?;

        tracing::trace!(
            session_id = msg.session_id,
            message_id,
            written,
            "Message sent"
        );

        Ok(written)
    }

    /// Requests a new session for `service_type`.
    pub fn start(&self, service_type: ServiceType) -> Result<(), ProtocolError> {
        self.start_with_params(service_type, Vec::new())
    }

    /// Requests a new session, attaching opaque start parameters (e.g.
    /// streaming settings for Video) to the StartSession frame.
    pub fn start_with_params(
        &self,
        service_type: ServiceType,
        params: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let mut actions = ControlActions::default();
        self.sessions
            .lock()
            .lifecycle
            .start(service_type, params, &mut actions)?;

        self.emit_frames(&actions.frames);
        Ok(())
    }

    /// Asks the peer to end `session_id`.
    ///
    /// Waits for any message currently being fragmented on the session to
    /// finish. The session stays usable for inbound traffic until the peer
    /// acknowledges.
    pub fn end(&self, session_id: u8) -> Result<(), ProtocolError> {
        let (guard, frame) = self.sessions.lock().lifecycle.prepare_end(session_id)?;

        let _lock = guard.lock()?;
        self.emit_frame(&frame);

        // Sends that fetched the guard before the state change must not
        // follow the EndSession onto the wire
        guard.close();

        Ok(())
    }

    /// Drives time-based behavior: heartbeats due, liveness expiry and
    /// abandoned reassembly contexts.
    pub fn tick(&self, now: Instant) -> ProtocolEvents {
        let mut events = ProtocolEvents::default();
        let mut heartbeats = Vec::new();

        let mut inbound = self.inbound.lock();
        for error in inbound.reassembler.evict_expired(now) {
            tracing::warn!(%error, "Reassembly expired");
            events.push(ProtocolEvent::ProtocolError(error));
        }

        {
            let mut table = self.sessions.lock();
            let poll = table.heartbeat.poll(now);

            for session_id in poll.due {
                let Some(session) = table.lifecycle.session(session_id) else {
                    continue;
                };
                if session.state != SessionState::Active {
                    continue;
                }

                let frame = Frame::control(
                    session.negotiated_version,
                    ServiceType::Control,
                    ControlFrameInfo::Heartbeat,
                    session_id,
                    0,
                );
                heartbeats.push((session.send_guard.clone(), frame));
                table.heartbeat.record_sent(session_id, now);
            }

            for error in poll.expired {
                tracing::warn!(%error, "Heartbeat timeout");
                match error {
                    ProtocolError::LivenessTimeout {
                        session_id,
                        timeout,
                    } => events.push(ProtocolEvent::HeartbeatTimeout {
                        session_id,
                        timeout,
                    }),
                    other => events.push(ProtocolEvent::ProtocolError(other)),
                }
            }
        }

        drop(inbound);

        // Heartbeats queue behind a message being fragmented on their session
        for (guard, frame) in heartbeats {
            if let Ok(_lock) = guard.lock() {
                self.emit_frame(&frame);
            }
        }

        events
    }

    /// Forgets the connection: every session is closed (with a
    /// `SessionEnded` event each), pending handshakes are dropped and all
    /// buffered inbound state is discarded.
    pub fn reset(&self) -> ProtocolEvents {
        let mut actions = ControlActions::default();

        let mut inbound = self.inbound.lock();
        inbound.decoder.clear();
        inbound.reassembler.clear();

        {
            let mut table = self.sessions.lock();
            table.lifecycle.reset(&mut actions);
            table.heartbeat.clear();
        }

        tracing::debug!(closed = actions.closed.len(), "Engine reset");

        let mut events = ProtocolEvents::default();
        events.extend(actions.events);
        events
    }

    pub fn session_state(&self, session_id: u8) -> Option<SessionState> {
        self.sessions.lock().lifecycle.session_state(session_id)
    }

    pub fn service_state(&self, service_type: ServiceType) -> SessionState {
        self.sessions.lock().lifecycle.service_state(service_type)
    }

    pub fn active_sessions(&self) -> Vec<(u8, ServiceType)> {
        self.sessions.lock().lifecycle.active_sessions()
    }

    pub fn is_active(&self, session_id: u8) -> bool {
        self.session_state(session_id) == Some(SessionState::Active)
    }

    /// Version agreed for `session_id`, once its handshake completed.
    pub fn negotiated_version(&self, session_id: u8) -> Option<u8> {
        self.sessions
            .lock()
            .lifecycle
            .session(session_id)
            .map(|s| s.negotiated_version)
    }

    /// Messages currently waiting for more fragments.
    pub fn in_flight_reassemblies(&self) -> usize {
        self.inbound.lock().reassembler.in_flight()
    }
}
