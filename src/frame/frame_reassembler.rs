use crate::{
    constants::{
        DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_REASSEMBLY_CONTEXTS, DEFAULT_REASSEMBLY_TIMEOUT,
        FIRST_FRAME_PAYLOAD_SIZE,
    },
    engine::ProtocolError,
    frame::{Frame, FrameDecodeError, FrameType, ServiceType, frame_header::read_u32_be},
    message::LogicalMessage,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Bounds on the memory the reassembler may hold for incomplete messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReassemblyLimits {
    pub max_message_size: usize,
    pub max_contexts: usize,
    pub timeout: Duration,
}

impl Default for ReassemblyLimits {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_contexts: DEFAULT_MAX_REASSEMBLY_CONTEXTS,
            timeout: DEFAULT_REASSEMBLY_TIMEOUT,
        }
    }
}

/// What happened to a frame handed to [`FrameReassembler::accept`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyOutcome {
    /// Absorbed; the message is still waiting for more frames.
    Pending,

    /// The frame completed a message.
    Complete(LogicalMessage),

    /// The frame was accepted, but an older in-flight context was thrown
    /// away to make room for it.
    Displaced(ProtocolError),

    /// The frame was dropped.
    Dropped(ProtocolError),
}

type ReassemblyKey = (u8, u32); // (session_id, message_id)

#[derive(Debug)]
struct ReassemblyContext {
    service_type: ServiceType,
    version: u8,
    declared_total_size: usize,
    frames_remaining: u32, // Informational; completion is driven by the terminator
    accumulated_bytes: Vec<u8>,
    started_at: Instant,
}

/// Turns Single, First and Consecutive data frames back into logical
/// messages.
///
/// In-flight messages are keyed by `(session_id, message_id)`, so message
/// ids that repeat across sessions never collide. A message completes
/// exactly when the Consecutive frame carrying the `0x00` terminator
/// arrives.
///
/// State is bounded: contexts beyond `max_contexts` evict the oldest one,
/// declared sizes above `max_message_size` are refused, and
/// [`evict_expired`](Self::evict_expired) drops contexts that never finish.
///
/// Not thread-safe; the engine feeds it from its single inbound flow.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    limits: ReassemblyLimits,
    contexts: HashMap<ReassemblyKey, ReassemblyContext>,
}

impl FrameReassembler {
    pub fn new(limits: ReassemblyLimits) -> Self {
        Self {
            limits,
            contexts: HashMap::new(),
        }
    }

    /// Number of messages currently being reassembled.
    pub fn in_flight(&self) -> usize {
        self.contexts.len()
    }

    /// Heap bytes currently reserved for incomplete messages.
    pub fn buffered_bytes(&self) -> usize {
        self.contexts
            .values()
            .map(|ctx| ctx.accumulated_bytes.capacity())
            .sum()
    }

    pub fn accept(&mut self, frame: Frame, now: Instant) -> ReassemblyOutcome {
        match frame.frame_type {
            FrameType::Single => self.complete_single(frame),
            FrameType::First => self.start_context(frame, now),
            FrameType::Consecutive => self.append(frame),
            FrameType::Control => ReassemblyOutcome::Dropped(ProtocolError::ProtocolViolation(
                "control frame routed to reassembler".into(),
            )),
        }
    }

    fn complete_single(&self, frame: Frame) -> ReassemblyOutcome {
        match LogicalMessage::from_payload(
            frame.service_type,
            frame.session_id,
            frame.version,
            frame.payload,
        ) {
            Ok(msg) => ReassemblyOutcome::Complete(msg),
            Err(e) => ReassemblyOutcome::Dropped(e.into()),
        }
    }

    fn start_context(&mut self, frame: Frame, now: Instant) -> ReassemblyOutcome {
        let session_id = frame.session_id;
        let message_id = frame.message_id;

        if frame.payload.len() != FIRST_FRAME_PAYLOAD_SIZE {
            return ReassemblyOutcome::Dropped(
                FrameDecodeError::MalformedFirstFrame(frame.payload.len()).into(),
            );
        }

        let declared_total_size = read_u32_be(&frame.payload, 0) as usize;
        let frame_count = read_u32_be(&frame.payload, 4);

        if declared_total_size > self.limits.max_message_size {
            return ReassemblyOutcome::Dropped(ProtocolError::MessageTooLarge {
                session_id,
                message_id,
                size: declared_total_size,
                max: self.limits.max_message_size,
            });
        }

        let key = (session_id, message_id);
        let mut displaced = None;

        if self.contexts.remove(&key).is_some() {
            displaced = Some(ProtocolError::DuplicateFirstFrame {
                session_id,
                message_id,
            });
        } else if self.contexts.len() >= self.limits.max_contexts {
            if let Some(oldest) = self
                .contexts
                .iter()
                .min_by_key(|(_, ctx)| ctx.started_at)
                .map(|(key, _)| *key)
            {
                self.contexts.remove(&oldest);
                displaced = Some(ProtocolError::ReassemblyEvicted {
                    session_id: oldest.0,
                    message_id: oldest.1,
                });
            }
        }

        tracing::trace!(
            session_id,
            message_id,
            declared_total_size,
            frame_count,
            "Started reassembly"
        );

        self.contexts.insert(
            key,
            ReassemblyContext {
                service_type: frame.service_type,
                version: frame.version,
                declared_total_size,
                frames_remaining: frame_count,
                // Grows with the bytes actually received, not the declared size
                accumulated_bytes: Vec::new(),
                started_at: now,
            },
        );

        match displaced {
            Some(e) => ReassemblyOutcome::Displaced(e),
            None => ReassemblyOutcome::Pending,
        }
    }

    fn append(&mut self, frame: Frame) -> ReassemblyOutcome {
        let session_id = frame.session_id;
        let message_id = frame.message_id;
        let key = (session_id, message_id);
        let is_terminal = frame.is_terminal();

        let Some(ctx) = self.contexts.get_mut(&key) else {
            return ReassemblyOutcome::Dropped(ProtocolError::UnknownReassemblyTarget {
                session_id,
                message_id,
            });
        };

        if ctx.accumulated_bytes.len() + frame.payload.len() > ctx.declared_total_size {
            let declared = ctx.declared_total_size;
            self.contexts.remove(&key);
            return ReassemblyOutcome::Dropped(ProtocolError::ReassemblyOverflow {
                session_id,
                message_id,
                declared,
            });
        }

        ctx.accumulated_bytes.extend_from_slice(&frame.payload);
        ctx.frames_remaining = ctx.frames_remaining.saturating_sub(1);

        if !is_terminal {
            return ReassemblyOutcome::Pending;
        }

        let Some(ctx) = self.contexts.remove(&key) else {
            return ReassemblyOutcome::Pending;
        };

        if ctx.frames_remaining != 0 {
            tracing::debug!(
                session_id,
                message_id,
                frames_remaining = ctx.frames_remaining,
                "Terminal frame arrived before the announced frame count"
            );
        }

        if ctx.accumulated_bytes.len() != ctx.declared_total_size {
            return ReassemblyOutcome::Dropped(ProtocolError::ReassemblySizeMismatch {
                session_id,
                message_id,
                declared: ctx.declared_total_size,
                received: ctx.accumulated_bytes.len(),
            });
        }

        match LogicalMessage::from_payload(
            ctx.service_type,
            session_id,
            ctx.version,
            ctx.accumulated_bytes,
        ) {
            Ok(msg) => ReassemblyOutcome::Complete(msg),
            Err(e) => ReassemblyOutcome::Dropped(e.into()),
        }
    }

    /// Removes contexts older than the configured timeout.
    pub fn evict_expired(&mut self, now: Instant) -> Vec<ProtocolError> {
        let timeout = self.limits.timeout;

        let expired: Vec<ReassemblyKey> = self
            .contexts
            .iter()
            .filter(|(_, ctx)| now.saturating_duration_since(ctx.started_at) >= timeout)
            .map(|(key, _)| *key)
            .collect();

        expired
            .into_iter()
            .filter_map(|key| {
                self.contexts
                    .remove(&key)
                    .map(|ctx| ProtocolError::ReassemblyExpired {
                        session_id: key.0,
                        message_id: key.1,
                        age: now.saturating_duration_since(ctx.started_at),
                    })
            })
            .collect()
    }

    /// Drops every in-flight context belonging to `session_id`.
    pub fn purge_session(&mut self, session_id: u8) -> usize {
        let before = self.contexts.len();
        self.contexts.retain(|(sid, _), _| *sid != session_id);
        before - self.contexts.len()
    }

    pub fn clear(&mut self) {
        self.contexts.clear();
    }
}
