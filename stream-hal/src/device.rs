//! Streaming device: buffer registry, transfer queue and completion strategy
//! behind one exclusive region.
//!
//! ## Contexts
//!
//! | Call | Context |
//! |------|---------|
//! | [`register`](Device::register), [`start`](Device::start), buffer `start`/`cancel`/`fill` | task |
//! | [`on_transfer_complete`](Device::on_transfer_complete) | peripheral ISR |
//! | [`on_timer`](Device::on_timer) | timer callback |
//! | [`dispatch`](Device::dispatch) | task (the runtime loop) |
//!
//! ## Usage with a static device
//!
//! ```ignore
//! static DEVICE: Device<'static, I2sBackend, &Loop, NvicMask<Interrupt>, 2> =
//!     Device::new(CONFIG, I2sBackend::new(), &LOOP, NvicMask::new(Interrupt::I2S));
//!
//! let a = DEVICE.register(unsafe { &mut BUFFER_A })?;
//! let b = DEVICE.register(unsafe { &mut BUFFER_B })?;
//! DEVICE.start()?;
//!
//! #[interrupt]
//! fn I2S() {
//!     DEVICE.on_transfer_complete();
//! }
//! ```

use core::cell::UnsafeCell;
use core::task::{Context, Poll};

use crate::backend::Backend;
use crate::buffer::{Buffer, BufferDevice, BufferId, BufferState, Buffers, Op};
use crate::config::DeviceConfig;
use crate::error::Error;
use crate::exclusive::ExclusiveRegion;
use crate::pipeline::{Outbox, Pipeline, Stats};
use crate::scheduler::Scheduler;
use crate::slot::{RawMemory, Slot};
use crate::spsc::SpscQueue;
use crate::strategy::{CompletionStrategy, Strategy};

/// Overall device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Not started, failed to initialize, or faulted. Buffers cannot start.
    Disabled,
    /// Accepting transfers, none in flight.
    Ready,
    /// Accepting transfers, some in flight.
    Busy,
}

struct Inner<'a, B, const N: usize> {
    pipeline: Pipeline<'a, B, N>,
    strategy: Strategy,
    /// Outcome of the one and only `Device::start`.
    started: Option<Result<(), Error>>,
}

impl<'a, B: Backend, const N: usize> Inner<'a, B, N> {
    fn in_flight(&self) -> bool {
        !self.pipeline.queue.is_empty() || self.strategy.active().is_some()
    }

    /// Disable the device and release every waiter.
    fn disable<S: Scheduler>(&mut self, outbox: &Outbox<'_, S, N>) {
        self.pipeline.state = DeviceState::Disabled;
        self.strategy.reset(&mut self.pipeline);
        let released = self.pipeline.release_all(BufferState::Disabled, outbox);
        log::warn!("device disabled, {} transfers abandoned", released);
    }

    fn check<S: Scheduler>(
        &mut self,
        outbox: &Outbox<'_, S, N>,
        result: Result<(), B::Error>,
    ) -> Result<(), Error> {
        result.map_err(|error| {
            log::error!("backend fault: {:?}", error);
            self.disable(outbox);
            Error::Backend
        })
    }
}

/// A streaming peripheral with up to `N` registered buffers.
///
/// - `B`: the platform [`Backend`]; its [`COMPLETION`](Backend::COMPLETION)
///   picks the completion strategy.
/// - `S`: the [`Scheduler`] bridge to the task runtime.
/// - `X`: the [`ExclusiveRegion`] masking the interrupt that drives `B`.
pub struct Device<'a, B: Backend, S: Scheduler, X: ExclusiveRegion, const N: usize> {
    inner: UnsafeCell<Inner<'a, B, N>>,
    completions: SpscQueue<BufferId, N>,
    scheduler: S,
    region: X,
}

// SAFETY: `inner` is only reached through `with_inner`, which holds the
// exclusive region for the whole access, so interrupt and task context never
// alias it. The notification channel is SPSC: pushes happen inside the region,
// pops only in `dispatch` (task context). Buffer memory is only read by the
// backend while `Busy` and only handed to the application while not.
unsafe impl<B, S, X, const N: usize> Sync for Device<'_, B, S, X, N>
where
    B: Backend + Send,
    S: Scheduler + Sync,
    X: ExclusiveRegion + Sync,
{
}

impl<'a, B: Backend, S: Scheduler, X: ExclusiveRegion, const N: usize> Device<'a, B, S, X, N> {
    /// Create a disabled device. Nothing touches the backend until
    /// [`start`](Self::start).
    pub const fn new(config: DeviceConfig, backend: B, scheduler: S, region: X) -> Self {
        Device {
            inner: UnsafeCell::new(Inner {
                pipeline: Pipeline::new(config, backend),
                strategy: Strategy::for_kind(B::COMPLETION),
                started: None,
            }),
            completions: SpscQueue::new(),
            scheduler,
            region,
        }
    }

    /// Run `f` on the shared state with the exclusive region held.
    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<'a, B, N>, &Outbox<'_, S, N>) -> R) -> R {
        let _guard = self.region.lock();
        // SAFETY: the guard masks the only other context that reaches
        // `inner`, and no caller of `with_inner` re-enters it: backend and
        // scheduler hooks must not call back into the device.
        let inner = unsafe { &mut *self.inner.get() };
        let outbox = Outbox {
            scheduler: &self.scheduler,
            completions: &self.completions,
        };
        f(inner, &outbox)
    }

    /// Validate the configuration and initialize the backend.
    ///
    /// Runs once. On failure the device stays [`Disabled`](DeviceState::Disabled)
    /// for good and later calls keep failing; on success every registered
    /// buffer becomes `Ready`.
    pub fn start(&self) -> Result<(), Error> {
        self.with_inner(|inner, _| match inner.started {
            Some(Err(e)) => Err(e),
            Some(Ok(())) if inner.pipeline.state == DeviceState::Disabled => Err(Error::Disabled),
            Some(Ok(())) => Ok(()),
            None => {
                let result = Self::initialize(&mut inner.pipeline);
                inner.started = Some(result);
                result
            }
        })
    }

    fn initialize(pipeline: &mut Pipeline<'a, B, N>) -> Result<(), Error> {
        let config = pipeline.config;
        config.validate().inspect_err(|e| log::warn!("{}", e))?;
        if let Err(e) = pipeline.backend.initialize(&config) {
            log::warn!("backend initialization failed: {:?}", e);
            return Err(Error::Init);
        }

        pipeline.state = DeviceState::Ready;
        for slot in pipeline.slots.iter_mut() {
            if slot.state == BufferState::Disabled {
                slot.state = BufferState::Ready;
            }
        }
        log::info!(
            "device ready: {} Hz, {} channel(s), {:?}",
            config.sample_rate,
            config.channels,
            config.format
        );
        Ok(())
    }

    /// Add `memory` to the registry as a new buffer.
    ///
    /// The buffer starts `Ready` on a started device and `Disabled` otherwise.
    pub fn register(&self, memory: &'a mut [u8]) -> Result<BufferId, Error> {
        self.with_inner(|inner, _| {
            let pipeline = &mut inner.pipeline;
            let state = match pipeline.state {
                DeviceState::Disabled => BufferState::Disabled,
                _ => BufferState::Ready,
            };
            let id = BufferId::new(pipeline.slots.len());
            pipeline
                .slots
                .push(Slot::new(memory, state))
                .map_err(|_| Error::RegistryFull)?;
            Ok(id)
        })
    }

    pub fn state(&self) -> DeviceState {
        self.with_inner(|inner, _| match inner.pipeline.state {
            DeviceState::Disabled => DeviceState::Disabled,
            _ if inner.in_flight() => DeviceState::Busy,
            _ => DeviceState::Ready,
        })
    }

    pub fn config(&self) -> DeviceConfig {
        self.with_inner(|inner, _| inner.pipeline.config)
    }

    pub fn stats(&self) -> Stats {
        self.with_inner(|inner, _| inner.pipeline.stats)
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Run `f` on the backend with the exclusive region held, e.g. to
    /// acknowledge a peripheral event.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        self.with_inner(|inner, _| f(&mut inner.pipeline.backend))
    }

    /// Handle to the buffer at `index` in registration order.
    pub fn buffer(&self, index: usize) -> Option<Buffer<'_>> {
        (index < self.buffer_count()).then(|| Buffer::new(self, BufferId::new(index)))
    }

    /// Handles to all registered buffers.
    pub fn buffers(&self) -> Buffers<'_> {
        Buffers::new(self)
    }

    /// Hardware finished a buffer. Call from the peripheral's interrupt
    /// handler on event-driven backends.
    pub fn on_transfer_complete(&self) {
        self.with_inner(|inner, outbox| {
            if inner.pipeline.state == DeviceState::Disabled {
                return;
            }
            let result = inner.strategy.transfer_complete(&mut inner.pipeline, outbox);
            // Reported to waiters through the disabled buffers
            let _ = inner.check(outbox, result);
        })
    }

    /// The timer armed through [`Scheduler::arm_timer`] fired.
    pub fn on_timer(&self) {
        self.with_inner(|inner, outbox| {
            if inner.pipeline.state == DeviceState::Disabled {
                return;
            }
            let result = inner.strategy.timer_expired(&mut inner.pipeline, outbox);
            let _ = inner.check(outbox, result);
        })
    }

    /// Take the oldest completion notification and wake the task awaiting
    /// that buffer. Call from task context until it returns `None`.
    ///
    /// Completions come out in the order the buffers first completed, which
    /// is the order they were submitted. Notifications are coalesced per
    /// buffer: one that completes again before its pending notification was
    /// taken is reported once, at the position of its first completion, even
    /// if other buffers completed in between. Check [`Buffer::state`] and
    /// [`Buffer::len`] rather than counting notifications.
    ///
    /// [`Buffer::state`]: crate::buffer::Buffer::state
    /// [`Buffer::len`]: crate::buffer::Buffer::len
    pub fn dispatch(&self) -> Option<BufferId> {
        let id = self.completions.pop()?;
        let waker = self.with_inner(|inner, _| {
            let slot = &mut inner.pipeline.slots[id.index()];
            slot.notify_pending = false;
            slot.waker.take()
        });
        if let Some(waker) = waker {
            waker.wake();
        }
        Some(id)
    }

    /// Report a backend fault detected outside the core (e.g. an error
    /// interrupt). The device becomes disabled and every in-flight buffer
    /// completes as `Disabled` with length 0.
    pub fn fault(&self) {
        self.with_inner(|inner, outbox| {
            log::error!("backend fault reported");
            inner.disable(outbox);
        })
    }

    /// Abandon every in-flight transfer: the engine is stopped and busy
    /// buffers return to `Ready` with length 0. The device stays usable.
    pub fn drain(&self) {
        self.with_inner(|inner, outbox| {
            inner.strategy.reset(&mut inner.pipeline);
            let released = inner.pipeline.release_all(BufferState::Ready, outbox);
            if released > 0 {
                log::debug!("drained {} transfers", released);
            }
        })
    }

    /// Mark `id` lent to the application for as long as the lease lives.
    fn lend(&self, id: BufferId) -> Result<Lease<'_, 'a, B, S, X, N>, Error> {
        self.with_inner(|inner, _| {
            let slot = inner.pipeline.slots.get_mut(id.index()).ok_or(Error::InvalidBuffer)?;
            if slot.state == BufferState::Busy || slot.lent {
                return Err(Error::Busy);
            }
            slot.lent = true;
            Ok(Lease {
                device: self,
                id,
                data: slot.raw(),
            })
        })
    }

    fn start_buffer_inner(&self, id: BufferId, op: Op) -> Result<(), Error> {
        assert!(!op.is_empty(), "transfer needs READ or WRITE");
        assert!(
            B::OPS.contains(op),
            "transfer direction not supported by this backend"
        );
        self.with_inner(|inner, outbox| {
            let pipeline = &mut inner.pipeline;
            if pipeline.state == DeviceState::Disabled {
                return Err(Error::Disabled);
            }
            let slot = pipeline.slots.get_mut(id.index()).ok_or(Error::InvalidBuffer)?;
            match slot.state {
                BufferState::Ready if slot.lent => return Err(Error::Busy),
                BufferState::Ready => {}
                BufferState::Busy => return Err(Error::Busy),
                BufferState::Disabled => return Err(Error::Disabled),
            }
            let was_empty = pipeline.queue.push(id).map_err(|_| Error::Busy)?;
            slot.state = BufferState::Busy;

            let result = inner
                .strategy
                .submitted(&mut inner.pipeline, outbox, id, was_empty);
            inner.check(outbox, result)
        })
    }
}

/// A slot's memory lent to the application; the slot is released on drop,
/// including when the application's closure panics.
struct Lease<'d, 'a, B: Backend, S: Scheduler, X: ExclusiveRegion, const N: usize> {
    device: &'d Device<'a, B, S, X, N>,
    id: BufferId,
    data: RawMemory,
}

impl<B: Backend, S: Scheduler, X: ExclusiveRegion, const N: usize> Lease<'_, '_, B, S, X, N> {
    /// # Safety
    /// The slot stays lent while the slice lives.
    unsafe fn slot_memory_mut(&self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.data.ptr.as_ptr(), self.data.capacity) }
    }

    /// # Safety
    /// As for `slot_memory_mut`.
    unsafe fn slot_bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.data.ptr.as_ptr(), self.data.len) }
    }
}

impl<B: Backend, S: Scheduler, X: ExclusiveRegion, const N: usize> Drop
    for Lease<'_, '_, B, S, X, N>
{
    fn drop(&mut self) {
        self.device
            .with_inner(|inner, _| inner.pipeline.slots[self.id.index()].lent = false);
    }
}

impl<B: Backend, S: Scheduler, X: ExclusiveRegion, const N: usize> BufferDevice
    for Device<'_, B, S, X, N>
{
    fn buffer_count(&self) -> usize {
        self.with_inner(|inner, _| inner.pipeline.slots.len())
    }

    fn buffer_state(&self, id: BufferId) -> BufferState {
        self.with_inner(|inner, _| {
            inner
                .pipeline
                .slots
                .get(id.index())
                .map_or(BufferState::Disabled, |slot| slot.state)
        })
    }

    fn buffer_len(&self, id: BufferId) -> usize {
        self.with_inner(|inner, _| inner.pipeline.slots.get(id.index()).map_or(0, |s| s.len))
    }

    fn buffer_capacity(&self, id: BufferId) -> usize {
        self.with_inner(|inner, _| {
            inner
                .pipeline
                .slots
                .get(id.index())
                .map_or(0, |s| s.capacity())
        })
    }

    fn start_buffer(&self, id: BufferId, op: Op) -> Result<(), Error> {
        self.start_buffer_inner(id, op)
    }

    fn cancel_buffer(&self, id: BufferId) -> Result<(), Error> {
        self.with_inner(|inner, outbox| {
            let Inner { pipeline, strategy, .. } = inner;
            let slot = pipeline.slots.get(id.index()).ok_or(Error::InvalidBuffer)?;
            if slot.state != BufferState::Busy {
                return Err(Error::NotBusy);
            }
            if strategy.withdraw(pipeline, id) {
                pipeline.slots[id.index()].len = 0;
                pipeline.complete(id, outbox);
                log::trace!("buffer {} cancelled", id.index());
            }
            Ok(())
        })
    }

    fn fill_buffer(
        &self,
        id: BufferId,
        f: &mut dyn FnMut(&mut [u8]) -> usize,
    ) -> Result<usize, Error> {
        let lease = self.lend(id)?;
        // SAFETY: the slot is not `Busy` and is marked lent until `lease`
        // drops, so neither the backend nor another `fill`/`read` touches the
        // memory while `f` holds it.
        let memory = unsafe { lease.slot_memory_mut() };

        let capacity = memory.len();
        let len = f(memory);
        if len > capacity {
            return Err(Error::TooLong { len, capacity });
        }
        self.with_inner(|inner, _| inner.pipeline.slots[id.index()].len = len);
        Ok(len)
    }

    fn read_buffer(&self, id: BufferId, f: &mut dyn FnMut(&[u8])) -> Result<(), Error> {
        let lease = self.lend(id)?;
        // SAFETY: as in `fill_buffer`; nothing writes while the lease lives.
        f(unsafe { lease.slot_bytes() });
        Ok(())
    }

    fn poll_buffer(&self, id: BufferId, cx: &mut Context<'_>) -> Poll<BufferState> {
        self.with_inner(|inner, _| {
            let Some(slot) = inner.pipeline.slots.get_mut(id.index()) else {
                return Poll::Ready(BufferState::Disabled);
            };
            match slot.state {
                BufferState::Busy => {
                    match &slot.waker {
                        Some(waker) if waker.will_wake(cx.waker()) => {}
                        _ => slot.waker = Some(cx.waker().clone()),
                    }
                    Poll::Pending
                }
                state => Poll::Ready(state),
            }
        })
    }
}

impl<B: Backend, S: Scheduler, X: ExclusiveRegion, const N: usize> Drop for Device<'_, B, S, X, N> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.strategy.reset(&mut inner.pipeline);
        let outbox = Outbox {
            scheduler: &self.scheduler,
            completions: &self.completions,
        };
        inner.pipeline.release_all(BufferState::Ready, &outbox);
    }
}
