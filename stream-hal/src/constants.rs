/// Default stream sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Largest channel count a [`DeviceConfig`](crate::config::DeviceConfig) accepts.
pub const MAX_CHANNELS: u16 = 8;

/// Upper bound on buffers per device (`BufferId` is a `u8` index).
pub const MAX_BUFFERS: usize = 256;

/// Milliseconds per second, used when turning frame counts into timer delays.
pub const MILLIS_PER_SECOND: u64 = 1_000;
