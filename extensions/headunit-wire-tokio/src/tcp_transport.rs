use crate::TransportState;
use headunit_wire::engine::{ProtocolConfig, ProtocolEngine, ProtocolEvent};
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
    task::JoinHandle,
};

/// How often the engine's timers (heartbeats, liveness, reassembly expiry)
/// are driven.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

const READ_BUFFER_SIZE: usize = 16 * 1024;

type StateChangeHandler = Box<dyn Fn(TransportState) + Send + Sync>;

struct Shared {
    engine: Arc<ProtocolEngine>,
    is_connected: AtomicBool,
    state_change_handler: Mutex<Option<StateChangeHandler>>,
    event_tx: mpsc::UnboundedSender<ProtocolEvent>,
    addr: SocketAddr,
}

impl Shared {
    fn forward<I: IntoIterator<Item = ProtocolEvent>>(&self, events: I) {
        for event in events {
            // Receiver dropped: the caller no longer cares
            let _ = self.event_tx.send(event);
        }
    }

    /// Runs at most once per connection.
    fn disconnect(&self) {
        if !self.is_connected.swap(false, Ordering::AcqRel) {
            return;
        }

        tracing::info!("Peer {} disconnected.", self.addr);

        self.forward(self.engine.reset());

        if let Some(handler) = self.state_change_handler.lock().as_ref() {
            handler(TransportState::Disconnected);
        }
    }
}

/// Runs a [`ProtocolEngine`] over one TCP connection.
///
/// Three pieces cooperate:
/// - the engine's emit callback pushes encoded frames onto an unbounded
///   channel, so sends never wait on the socket;
/// - a sender task drains that channel into the socket;
/// - a receiver task feeds socket reads to the engine and drives its timers,
///   forwarding every resulting [`ProtocolEvent`] to the caller.
///
/// When the connection is lost the engine is reset, which closes every
/// session and emits their `SessionEnded` events. Reconnecting is left to the
/// caller.
pub struct TcpTransport {
    shared: Arc<Shared>,
    task_handles: Vec<JoinHandle<()>>,
}

impl TcpTransport {
    /// Connects to a peer listening on `host:port`.
    pub async fn connect(
        host: &str,
        port: u16,
        config: ProtocolConfig,
    ) -> io::Result<(Self, mpsc::UnboundedReceiver<ProtocolEvent>)> {
        let stream = TcpStream::connect((host, port)).await?;
        tracing::info!("Connected to {}:{}", host, port);

        Self::from_stream(stream, config)
    }

    /// Waits for one peer on `listener`.
    pub async fn accept(
        listener: &TcpListener,
        config: ProtocolConfig,
    ) -> io::Result<(Self, mpsc::UnboundedReceiver<ProtocolEvent>)> {
        let (stream, addr) = listener.accept().await?;
        tracing::info!("Peer connected: {}", addr);

        Self::from_stream(stream, config)
    }

    /// Takes over an already established stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream(
        stream: TcpStream,
        config: ProtocolConfig,
    ) -> io::Result<(Self, mpsc::UnboundedReceiver<ProtocolEvent>)> {
        stream.set_nodelay(true)?;
        let addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ProtocolEvent>();

        let engine = Arc::new(ProtocolEngine::new(config, move |bytes: Vec<u8>| {
            // Fails only once the sender task is gone
            let _ = frame_tx.send(bytes);
        }));

        let shared = Arc::new(Shared {
            engine,
            is_connected: AtomicBool::new(true),
            state_change_handler: Mutex::new(None),
            event_tx,
            addr,
        });

        let task_handles = vec![
            tokio::spawn(Self::sender_task(shared.clone(), writer, frame_rx)),
            tokio::spawn(Self::receiver_task(shared.clone(), reader)),
        ];

        Ok((
            Self {
                shared,
                task_handles,
            },
            event_rx,
        ))
    }

    pub fn engine(&self) -> &Arc<ProtocolEngine> {
        &self.shared.engine
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.shared.addr
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected.load(Ordering::Acquire)
    }

    /// Registers the connection state callback.
    ///
    /// The handler is invoked right away with `Connected` if the connection
    /// is still up, and later with `Disconnected` when it goes away.
    pub fn set_state_change_handler(
        &self,
        handler: impl Fn(TransportState) + Send + Sync + 'static,
    ) {
        let mut slot = self.shared.state_change_handler.lock();

        if self.is_connected() {
            handler(TransportState::Connected);
        }

        *slot = Some(Box::new(handler));
    }

    async fn sender_task(
        shared: Arc<Shared>,
        mut writer: OwnedWriteHalf,
        mut frame_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        while let Some(bytes) = frame_rx.recv().await {
            if let Err(err) = writer.write_all(&bytes).await {
                tracing::warn!("Write to {} failed: {}", shared.addr, err);
                break;
            }
        }

        shared.disconnect();
    }

    async fn receiver_task(shared: Arc<Shared>, mut reader: OwnedReadHalf) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    shared.forward(shared.engine.tick(Instant::now()));
                }

                result = reader.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::info!("Peer {} closed the connection.", shared.addr);
                            break;
                        }
                        Ok(n) => {
                            tracing::trace!("Received {} bytes from {}", n, shared.addr);
                            shared.forward(shared.engine.read_bytes(&buf[..n]));
                        }
                        Err(err) => {
                            tracing::warn!("Read from {} failed: {}", shared.addr, err);
                            break;
                        }
                    }
                }
            }
        }

        shared.disconnect();
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        for handle in &self.task_handles {
            handle.abort();
        }

        self.shared.disconnect();
    }
}
