//! Stream configuration and sample format descriptors.

use core::time::Duration;

use crate::constants::{DEFAULT_SAMPLE_RATE, MAX_CHANNELS, MILLIS_PER_SECOND};
use crate::error::Error;

/// Linear PCM sample encodings a backend may be asked to stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit.
    U8,
    /// Signed 16-bit.
    I16,
    /// Signed 24-bit, packed in 3 bytes.
    I24,
    /// Signed 24-bit stored in the low bits of a 32-bit word.
    I24In32,
    /// IEEE 754 single precision.
    F32,
}

/// Storage size and precision of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Bytes one sample occupies in a buffer.
    pub bytes_per_sample: u8,
    /// Significant bits within those bytes.
    pub valid_bits: u8,
}

impl SampleFormat {
    /// Look up the storage layout of this format.
    pub const fn info(self) -> FormatInfo {
        let (bytes_per_sample, valid_bits) = match self {
            SampleFormat::U8 => (1, 8),
            SampleFormat::I16 => (2, 16),
            SampleFormat::I24 => (3, 24),
            SampleFormat::I24In32 => (4, 24),
            SampleFormat::F32 => (4, 32),
        };
        FormatInfo {
            bytes_per_sample,
            valid_bits,
        }
    }
}

/// Immutable stream parameters, fixed when a device is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved samples per frame.
    pub channels: u16,
    /// Encoding of each sample.
    pub format: SampleFormat,
}

impl DeviceConfig {
    pub const fn new(sample_rate: u32, channels: u16, format: SampleFormat) -> Self {
        DeviceConfig {
            sample_rate,
            channels,
            format,
        }
    }

    /// Bytes per interleaved frame.
    pub const fn frame_bytes(&self) -> usize {
        self.format.info().bytes_per_sample as usize * self.channels as usize
    }

    /// Number of whole frames contained in `bytes` bytes.
    pub const fn frames_in(&self, bytes: usize) -> u64 {
        let frame = self.frame_bytes();
        if frame == 0 {
            return 0;
        }
        (bytes / frame) as u64
    }

    /// Playback time of `frames` frames, rounded up to the next millisecond.
    ///
    /// Rounding up keeps an estimate from ever declaring a buffer finished
    /// before its last frame has been played.
    pub const fn duration_for_frames(&self, frames: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let rate = self.sample_rate as u64;
        Duration::from_millis((frames * MILLIS_PER_SECOND).div_ceil(rate))
    }

    /// Check the parameters before they reach a backend.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample rate must be non-zero"));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(Error::InvalidConfig("channel count out of range"));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig::new(DEFAULT_SAMPLE_RATE, 1, SampleFormat::I16)
    }
}
