/// Hands one encoded frame to the transport.
///
/// Called while a session's send guard is held, so implementations must not
/// block on I/O or call back into the engine; queueing into a channel is
/// the expected shape.
pub trait FrameEmit: Fn(Vec<u8>) + Send + Sync {}
impl<T: Fn(Vec<u8>) + Send + Sync> FrameEmit for T {}
