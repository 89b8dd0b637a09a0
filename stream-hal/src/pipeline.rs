//! Shared transfer state of a device, everything the completion strategies
//! operate on.

use heapless::Vec;

use crate::backend::Backend;
use crate::buffer::{BufferId, BufferState};
use crate::config::DeviceConfig;
use crate::device::DeviceState;
use crate::queue::TransferQueue;
use crate::scheduler::Scheduler;
use crate::slot::Slot;
use crate::spsc::SpscQueue;

/// Running counters, readable through [`Device::stats`](crate::device::Device::stats).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// Buffers that finished a transfer or were cancelled back to `Ready`.
    pub completed: u32,
    /// Times the transfer engine ran dry and was stopped.
    pub underruns: u32,
}

impl Stats {
    pub const fn new() -> Self {
        Stats {
            completed: 0,
            underruns: 0,
        }
    }
}

/// Mutable device state guarded by the exclusive region.
pub(crate) struct Pipeline<'a, B, const N: usize> {
    pub(crate) backend: B,
    pub(crate) config: DeviceConfig,
    /// `Disabled` or `Ready`; `Busy` is derived.
    pub(crate) state: DeviceState,
    pub(crate) slots: Vec<Slot<'a>, N>,
    pub(crate) queue: TransferQueue<N>,
    /// Frames handed to the backend since the device started.
    pub(crate) position: u64,
    pub(crate) stats: Stats,
}

/// Where completions go: the notification channel and the runtime.
pub(crate) struct Outbox<'c, S, const N: usize> {
    pub(crate) scheduler: &'c S,
    pub(crate) completions: &'c SpscQueue<BufferId, N>,
}

impl<S: Scheduler, const N: usize> Outbox<'_, S, N> {
    /// Queue a wake-up for `id` unless one is already pending. A pending
    /// entry keeps its place in the channel, so a second completion is
    /// merged into the first one.
    fn post(&self, id: BufferId, slot: &mut Slot<'_>) {
        if slot.notify_pending {
            return;
        }
        if self.completions.push(id).is_ok() {
            slot.notify_pending = true;
            self.scheduler.notify();
        } else {
            // At most one pending entry per slot and capacity N
            debug_assert!(false, "completion channel overflow");
        }
    }

    pub(crate) fn arm_timer(&self, after: core::time::Duration) {
        self.scheduler.arm_timer(after);
    }
}

impl<'a, B: Backend, const N: usize> Pipeline<'a, B, N> {
    pub(crate) const fn new(config: DeviceConfig, backend: B) -> Self {
        Pipeline {
            backend,
            config,
            state: DeviceState::Disabled,
            slots: Vec::new(),
            queue: TransferQueue::new(),
            position: 0,
            stats: Stats::new(),
        }
    }

    /// Pass the valid bytes of `id` to the backend.
    pub(crate) fn submit(&mut self, id: BufferId) -> Result<(), B::Error> {
        let slot = &self.slots[id.index()];
        // SAFETY: the slot is `Busy`, so the application does not touch it.
        let data = unsafe { slot.bytes() };
        self.backend.submit(data)
    }

    /// Whole frames in the valid bytes of `id`.
    pub(crate) fn frames(&self, id: BufferId) -> u64 {
        self.config.frames_in(self.slots[id.index()].len)
    }

    /// Finish a transfer: `Busy → Ready` and wake whoever waits for it.
    pub(crate) fn complete<S: Scheduler>(&mut self, id: BufferId, outbox: &Outbox<'_, S, N>) {
        let slot = &mut self.slots[id.index()];
        debug_assert_eq!(slot.state, BufferState::Busy);
        slot.state = BufferState::Ready;
        outbox.post(id, slot);
        self.stats.completed = self.stats.completed.wrapping_add(1);
        log::trace!("buffer {} complete", id.index());
    }

    /// Move every slot out of `Busy` into `to`, zeroing their lengths, and
    /// return how many were in flight.
    pub(crate) fn release_all<S: Scheduler>(
        &mut self,
        to: BufferState,
        outbox: &Outbox<'_, S, N>,
    ) -> usize {
        self.queue.clear();
        let mut released = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.state == BufferState::Busy {
                slot.len = 0;
                slot.state = to;
                outbox.post(BufferId::new(index), slot);
                released += 1;
            } else if to == BufferState::Disabled {
                slot.state = to;
            }
        }
        released
    }
}
