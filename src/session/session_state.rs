/// Lifecycle of one logical session.
///
/// ```text
/// Idle -> AwaitingStartAck -> Active -> AwaitingEndAck -> Closed
///                 |
///                 +--(NACK)--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    AwaitingStartAck,
    Active,
    AwaitingEndAck,
    Closed,
    Failed,
}

impl SessionState {
    /// A new StartSession may be issued from this state.
    pub fn can_start(self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Closed | SessionState::Failed
        )
    }
}
