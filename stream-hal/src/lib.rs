//! # stream-hal
//!
//! A `no_std`, allocation-free core for streaming peripherals (audio output
//! being the typical one) on interrupt-driven targets. The application owns a
//! small set of buffers, fills them, and starts them; the device hands them to
//! a platform backend in order and gives each one back when the hardware is
//! done with it.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Buffers | [`buffer`] | `Buffer` handles, state machine, awaitable completion |
//! | Queueing | [`queue`] / [`spsc`] | Transfer FIFO, lock-free completion channel |
//! | Platform | [`backend`] / [`exclusive`] | Transfer engine contract, interrupt masking |
//! | Runtime | [`scheduler`] | Timers and wake-ups from the task runtime |
//! | Core | [`device`] | Registry, completion strategies, fault handling |
//! | Helpers | `tone` / `indicator` | Sine source, underrun LED (feature-gated) |
//!
//! ## Quick start
//!
//! ```ignore
//! use stream_hal::{BufferState, CriticalSection, Device, DeviceConfig, SampleFormat};
//!
//! static mut MEMORY: [[u8; 8192]; 2] = [[0; 8192]; 2];
//!
//! let device: Device<'_, HostAudio, &Loop, CriticalSection, 2> = Device::new(
//!     DeviceConfig::new(48_000, 1, SampleFormat::I16),
//!     HostAudio::open()?,
//!     &runtime,
//!     CriticalSection,
//! );
//! let [a, b] = unsafe { &mut MEMORY };
//! device.register(a)?;
//! device.register(b)?;
//! device.start()?;
//!
//! // In a task:
//! for buffer in device.buffers().cycle() {
//!     if buffer.until_ready_or_disabled().await == BufferState::Disabled {
//!         break;
//!     }
//!     buffer.fill(|memory| tone.fill_i16(memory))?;
//!     buffer.start(Op::WRITE);
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `tone` | yes | Sine table tone source ([`tone`]) |
//! | `indicator` | no | Underrun indicator pin (requires `embedded-hal`) |
//! | `cortex-m` | no | `NvicMask` exclusive region |
//!
//! ## Completion
//!
//! - **Event driven:** the peripheral interrupts per buffer; call
//!   [`Device::on_transfer_complete`] from the handler.
//! - **Estimated:** the backend only reports its backlog; the device arms
//!   timers through the [`Scheduler`] and expects [`Device::on_timer`].
//!
//! Either way the runtime calls [`Device::dispatch`] to wake waiting tasks.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod backend;
pub mod buffer;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod exclusive;
pub mod queue;
pub mod scheduler;
pub mod spsc;

mod pipeline;
mod slot;
mod strategy;

#[cfg(feature = "indicator")]
pub mod indicator;

#[cfg(feature = "tone")]
pub mod tone;

#[cfg(test)]
mod mock;


pub use backend::{Backend, CompletionKind};
pub use buffer::{Buffer, BufferDevice, BufferId, BufferState, Buffers, Op};
pub use config::{DeviceConfig, FormatInfo, SampleFormat};
pub use device::{Device, DeviceState};
pub use error::Error;
pub use exclusive::{CriticalSection, ExclusiveRegion, RegionGuard};
pub use pipeline::Stats;
pub use scheduler::Scheduler;

#[cfg(feature = "cortex-m")]
pub use exclusive::NvicMask;
