mod tcp_transport;
mod transport_state;

pub use tcp_transport::{TICK_INTERVAL, TcpTransport};
pub use transport_state::TransportState;
