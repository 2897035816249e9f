/// Connection state reported to the handler registered with
/// [`TcpTransport::set_state_change_handler`](crate::TcpTransport::set_state_change_handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connected,
    Disconnected,
}
