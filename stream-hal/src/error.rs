/// Recoverable failures reported by devices and buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Device failed to initialize, faulted, or has not been started.
    #[error("device is disabled")]
    Disabled,
    /// Buffer is already submitted.
    #[error("buffer is busy")]
    Busy,
    /// Buffer has no transfer to cancel.
    #[error("buffer is not busy")]
    NotBusy,
    /// Handle does not name a registered buffer.
    #[error("no buffer registered under this handle")]
    InvalidBuffer,
    /// Every buffer slot of the device is taken.
    #[error("buffer registry is full")]
    RegistryFull,
    /// Requested length does not fit the buffer's memory.
    #[error("length {len} exceeds buffer capacity {capacity}")]
    TooLong { len: usize, capacity: usize },
    /// Configuration rejected before reaching the backend.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Backend refused to initialize.
    #[error("backend initialization failed")]
    Init,
    /// Backend reported a fault while streaming.
    #[error("backend fault")]
    Backend,
}
