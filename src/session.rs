mod control_dispatcher;
mod heartbeat_monitor;
mod session_lifecycle;
mod session_record;
mod session_state;

pub use control_dispatcher::ControlFrameDispatcher;
pub use heartbeat_monitor::{HeartbeatConfig, HeartbeatMonitor, HeartbeatPoll};
pub use session_lifecycle::{ControlActions, SessionLifecycle};
pub use session_record::{SendGuard, SendGuardLock, Session};
pub use session_state::SessionState;
