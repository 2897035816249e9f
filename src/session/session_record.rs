use crate::{
    frame::{FrameEncodeError, ServiceType},
    session::SessionState,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-session critical section around "build every fragment of one message
/// and hand them to the transport".
///
/// Created when the session's handshake completes and closed on teardown.
/// Holding a [`SendGuardLock`] is what keeps two messages' fragments from
/// interleaving on the same session.
#[derive(Debug)]
pub struct SendGuard {
    state: Mutex<SendState>,
    open: AtomicBool,
}

#[derive(Debug)]
struct SendState {
    next_message_id: u32,
}

pub struct SendGuardLock<'a> {
    state: MutexGuard<'a, SendState>,
}

impl SendGuard {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SendState { next_message_id: 1 }),
            open: AtomicBool::new(true),
        }
    }

    /// Blocks until no other message is being fragmented on this session.
    pub fn lock(&self) -> Result<SendGuardLock<'_>, FrameEncodeError> {
        let state = self.state.lock();

        if !self.is_open() {
            return Err(FrameEncodeError::WriteAfterClose);
        }

        Ok(SendGuardLock { state })
    }

    /// Waits for a message that is mid-fragmentation to finish.
    pub(crate) fn wait_idle(&self) {
        drop(self.state.lock());
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Lets sends through again after the peer refused to end the session.
    pub(crate) fn reopen(&self) {
        self.open.store(true, Ordering::Release);
    }
}

impl SendGuardLock<'_> {
    /// Allocates the message id shared by every frame of the next message.
    pub fn next_message_id(&mut self) -> u32 {
        let id = self.state.next_message_id;
        self.state.next_message_id = id.wrapping_add(1);
        id
    }
}

/// An established (or closing) session, stored in the lifecycle arena at
/// index `session_id`.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: u8,
    pub service_type: ServiceType,
    pub negotiated_version: u8,

    /// Captured from StartSessionACK; required to end a v2+ session.
    pub validation_token: u32,

    pub state: SessionState,

    pub(crate) send_guard: Arc<SendGuard>,
}

impl Session {
    pub(crate) fn new(
        session_id: u8,
        service_type: ServiceType,
        negotiated_version: u8,
        validation_token: u32,
    ) -> Self {
        Self {
            session_id,
            service_type,
            negotiated_version,
            validation_token,
            state: SessionState::Active,
            send_guard: Arc::new(SendGuard::new()),
        }
    }

    /// Whether the v2+ token rule lets `token` end this session.
    pub fn accepts_token(&self, token: u32) -> bool {
        self.negotiated_version < 2 || token == self.validation_token
    }
}
