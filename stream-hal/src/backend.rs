//! Contract between the device core and a platform's transfer engine.
//!
//! A backend wraps one peripheral (an I2S block with its DMA pointer
//! register, a host audio session, ...). The core decides *what* to transfer
//! and *when*; the backend only moves bytes and reports progress.

use crate::buffer::Op;
use crate::config::DeviceConfig;

/// How a backend lets the core learn that a buffer has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// The peripheral raises an interrupt each time it is done with a buffer;
    /// the handler calls [`Device::on_transfer_complete`](crate::device::Device::on_transfer_complete).
    EventDriven,
    /// The backend only reports how many frames it still holds
    /// ([`Backend::query_backlog`]); completion is estimated from elapsed
    /// stream time using one-shot timers.
    Estimated,
}

/// Platform transfer engine.
///
/// All methods are called with the device's exclusive region held, either
/// from task context or from the peripheral's interrupt handler.
pub trait Backend {
    /// Backend-specific failure, logged by the core.
    type Error: core::fmt::Debug;

    /// Completion strategy the device uses for this backend.
    const COMPLETION: CompletionKind;

    /// Directions the peripheral can perform.
    const OPS: Op = Op::WRITE;

    /// One-time setup. Failure leaves the device permanently disabled.
    fn initialize(&mut self, config: &DeviceConfig) -> Result<(), Self::Error>;

    /// Hand one buffer's valid bytes to the transfer engine.
    ///
    /// For [`CompletionKind::EventDriven`] this programs the engine's next
    /// DMA pointer. It is called once to start an idle engine and otherwise
    /// while the previous buffer is still running, so at most two buffers are
    /// held at a time: the running one and the preloaded one. Each transfer
    /// event must mean that the running buffer is done and the preloaded one
    /// has taken over. The memory stays valid and untouched until the buffer
    /// completes. For [`CompletionKind::Estimated`] the bytes are usually
    /// copied into a host-side ring.
    fn submit(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Frames submitted but not yet played. Only used by
    /// [`CompletionKind::Estimated`] backends.
    fn query_backlog(&mut self) -> Result<u32, Self::Error> {
        Ok(0)
    }

    /// Start the transfer engine after it has been idle.
    fn start_engine(&mut self) {}

    /// Stop the transfer engine because no more buffers are queued.
    fn stop_engine(&mut self) {}
}
