//! Application-facing buffer handles.
//!
//! A device owns a registry of buffer slots; application code reaches a slot
//! through a [`Buffer`] handle, which is a `(device, BufferId)` pair. Handles
//! are `Copy` and hold no state of their own, so any number of them may exist.
//!
//! ## Lifecycle
//!
//! ```text
//!            start()              completion / cancel()
//!   READY ───────────► BUSY ───────────────────────────► READY
//!     │                  │
//!     └──── fault ───────┴──────────────────────────────► DISABLED
//! ```
//!
//! While a buffer is `Busy` its memory belongs to the transfer pipeline;
//! [`Buffer::fill`] and [`Buffer::read`] refuse access until it is `Ready`.
//! While `fill` or `read` runs the buffer is lent to the closure: any other
//! `start`, `fill` or `read` on it, through any handle, fails with
//! [`Error::Busy`].

use core::future::Future;
use core::ops::BitOr;
use core::pin::Pin;
use core::task::{Context, Poll};

use crate::error::Error;

/// Stable index of a buffer within its device's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u8);

impl BufferId {
    pub(crate) const fn new(index: usize) -> Self {
        debug_assert!(index < crate::constants::MAX_BUFFERS);
        BufferId(index as u8)
    }

    /// Registry index of this buffer.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ownership state of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Device unusable; `start` always fails.
    Disabled,
    /// Idle and owned by the application.
    Ready,
    /// Submitted and owned by the transfer pipeline.
    Busy,
}

/// Transfer direction flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Op(u8);

impl Op {
    pub const NONE: Op = Op(0);
    /// Peripheral → buffer.
    pub const READ: Op = Op(1);
    /// Buffer → peripheral.
    pub const WRITE: Op = Op(2);
    pub const READ_WRITE: Op = Op(3);

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` if every flag of `other` is set in `self`.
    pub const fn contains(self, other: Op) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` if `self` and `other` share at least one flag.
    pub const fn intersects(self, other: Op) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Op {
    type Output = Op;

    fn bitor(self, rhs: Op) -> Op {
        Op(self.0 | rhs.0)
    }
}

/// Object-safe view of a device's buffer registry.
///
/// Implemented by [`Device`](crate::device::Device); [`Buffer`] handles talk
/// to their device exclusively through this trait so that application code
/// does not need to name the device's backend, scheduler and region types.
pub trait BufferDevice {
    /// Number of registered buffers.
    fn buffer_count(&self) -> usize;

    /// Current state, `Disabled` for an unknown handle.
    fn buffer_state(&self, id: BufferId) -> BufferState;

    /// Bytes valid for the next (or last) transfer.
    fn buffer_len(&self, id: BufferId) -> usize;

    /// Size of the buffer's memory in bytes.
    fn buffer_capacity(&self, id: BufferId) -> usize;

    /// Submit the buffer for transfer. See [`Buffer::try_start`].
    fn start_buffer(&self, id: BufferId, op: Op) -> Result<(), Error>;

    /// Withdraw a submitted buffer. See [`Buffer::try_cancel`].
    fn cancel_buffer(&self, id: BufferId) -> Result<(), Error>;

    /// Give `f` write access to the whole memory of a `Ready` buffer and set
    /// its length to the value `f` returns.
    fn fill_buffer(
        &self,
        id: BufferId,
        f: &mut dyn FnMut(&mut [u8]) -> usize,
    ) -> Result<usize, Error>;

    /// Give `f` read access to the valid bytes of a non-`Busy` buffer.
    ///
    /// Both accessors fail with [`Error::Busy`] while the buffer is already
    /// lent to another `fill_buffer` or `read_buffer` call.
    fn read_buffer(&self, id: BufferId, f: &mut dyn FnMut(&[u8])) -> Result<(), Error>;

    /// Resolve once the buffer is no longer `Busy`, registering the task's
    /// waker otherwise.
    fn poll_buffer(&self, id: BufferId, cx: &mut Context<'_>) -> Poll<BufferState>;
}

/// Handle to one registered buffer.
#[derive(Clone, Copy)]
pub struct Buffer<'d> {
    device: &'d dyn BufferDevice,
    id: BufferId,
}

impl<'d> Buffer<'d> {
    pub fn new(device: &'d dyn BufferDevice, id: BufferId) -> Self {
        Buffer { device, id }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn state(&self) -> BufferState {
        self.device.buffer_state(self.id)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == BufferState::Ready
    }

    pub fn len(&self) -> usize {
        self.device.buffer_len(self.id)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.device.buffer_capacity(self.id)
    }

    /// Submit the buffer. Returns `false` if it is not `Ready` or the device
    /// is disabled.
    ///
    /// # Panics
    ///
    /// If `op` is empty or names a direction the backend cannot perform.
    pub fn start(&self, op: Op) -> bool {
        self.try_start(op).is_ok()
    }

    /// Like [`start`](Self::start), reporting why submission was refused.
    pub fn try_start(&self, op: Op) -> Result<(), Error> {
        self.device.start_buffer(self.id, op)
    }

    /// Set the length to `len` bytes and submit for writing.
    pub fn start_write(&self, len: usize) -> bool {
        self.set_len(len).is_ok() && self.start(Op::WRITE)
    }

    /// Set the length to `len` bytes and submit for reading.
    pub fn start_read(&self, len: usize) -> bool {
        self.set_len(len).is_ok() && self.start(Op::READ)
    }

    /// Withdraw the buffer. Returns `false` if it was not `Busy`.
    ///
    /// A buffer that the hardware has not picked up yet goes straight back
    /// to `Ready` with length 0; one already handed to the hardware is left
    /// to complete normally.
    pub fn cancel(&self) -> bool {
        self.try_cancel().is_ok()
    }

    pub fn try_cancel(&self) -> Result<(), Error> {
        self.device.cancel_buffer(self.id)
    }

    /// Write into the buffer's memory. `f` receives the full capacity and
    /// returns the number of valid bytes, which becomes the buffer length.
    ///
    /// Inside `f` the buffer cannot be started, filled or read again; those
    /// calls return [`Error::Busy`].
    pub fn fill(&self, mut f: impl FnMut(&mut [u8]) -> usize) -> Result<usize, Error> {
        self.device.fill_buffer(self.id, &mut f)
    }

    /// Set the number of valid bytes without touching the data.
    pub fn set_len(&self, len: usize) -> Result<(), Error> {
        self.device
            .fill_buffer(self.id, &mut |_: &mut [u8]| len)
            .map(|_| ())
    }

    /// Inspect the valid bytes, e.g. after a read transfer completed. Same
    /// lending rule as [`fill`](Self::fill).
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, Error> {
        let mut f = Some(f);
        let mut out = None;
        self.device.read_buffer(self.id, &mut |data: &[u8]| {
            if let Some(f) = f.take() {
                out = Some(f(data));
            }
        })?;
        out.ok_or(Error::InvalidBuffer)
    }

    /// Wait until the buffer is `Ready` or `Disabled`.
    pub fn until_ready_or_disabled(&self) -> UntilReadyOrDisabled<'d> {
        UntilReadyOrDisabled { buffer: *self }
    }
}

impl core::fmt::Debug for Buffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("len", &self.len())
            .finish()
    }
}

/// Iterator over every buffer of a device, in registration order.
#[derive(Clone)]
pub struct Buffers<'d> {
    device: &'d dyn BufferDevice,
    next: usize,
    count: usize,
}

impl<'d> Buffers<'d> {
    pub fn new(device: &'d dyn BufferDevice) -> Self {
        Buffers {
            device,
            next: 0,
            count: device.buffer_count(),
        }
    }
}

impl<'d> Iterator for Buffers<'d> {
    type Item = Buffer<'d>;

    fn next(&mut self) -> Option<Buffer<'d>> {
        if self.next == self.count {
            return None;
        }
        let buffer = Buffer::new(self.device, BufferId::new(self.next));
        self.next += 1;
        Some(buffer)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Buffers<'_> {}

/// Future returned by [`Buffer::until_ready_or_disabled`].
///
/// Resolves to the state the buffer was found in. The task is woken through
/// [`Device::dispatch`](crate::device::Device::dispatch), never directly from
/// interrupt context.
#[must_use = "futures do nothing unless polled"]
pub struct UntilReadyOrDisabled<'d> {
    buffer: Buffer<'d>,
}

impl Future for UntilReadyOrDisabled<'_> {
    type Output = BufferState;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<BufferState> {
        self.buffer.device.poll_buffer(self.buffer.id, cx)
    }
}
