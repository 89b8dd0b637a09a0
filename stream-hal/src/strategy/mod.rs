//! Completion strategies: deciding when a submitted buffer is done.
//!
//! | Strategy | Backend capability | Driven by |
//! |----------|--------------------|-----------|
//! | [`EventDriven`] | per-buffer interrupt | [`Device::on_transfer_complete`](crate::device::Device::on_transfer_complete) |
//! | [`Estimated`] | backlog counter only | [`Device::on_timer`](crate::device::Device::on_timer) |
//!
//! A device picks one from [`Backend::COMPLETION`] when it is constructed and
//! keeps it for its whole life.

mod estimated;
mod event;

pub(crate) use estimated::Estimated;
pub(crate) use event::EventDriven;

use crate::backend::{Backend, CompletionKind};
use crate::buffer::BufferId;
use crate::pipeline::{Outbox, Pipeline};
use crate::scheduler::Scheduler;

/// Hooks the device calls on the active strategy. Every hook runs with the
/// exclusive region held.
pub(crate) trait CompletionStrategy {
    /// `id` was just pushed onto the transfer queue; `was_empty` tells
    /// whether it is the only queued buffer.
    fn submitted<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        outbox: &Outbox<'_, S, N>,
        id: BufferId,
        was_empty: bool,
    ) -> Result<(), B::Error>;

    /// The peripheral signalled that it is done with a buffer.
    fn transfer_complete<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        _pipeline: &mut Pipeline<'_, B, N>,
        _outbox: &Outbox<'_, S, N>,
    ) -> Result<(), B::Error> {
        Ok(())
    }

    /// A timer armed through the scheduler fired.
    fn timer_expired<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        _pipeline: &mut Pipeline<'_, B, N>,
        _outbox: &Outbox<'_, S, N>,
    ) -> Result<(), B::Error> {
        Ok(())
    }

    /// Try to take `id` back before the hardware sees it. Returns `true` if
    /// it was removed from the queue.
    fn withdraw<B: Backend, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        id: BufferId,
    ) -> bool;

    /// Forget all in-flight transfers and stop the engine if it runs.
    fn reset<B: Backend, const N: usize>(&mut self, pipeline: &mut Pipeline<'_, B, N>);
}

/// The strategy a device was built with.
pub(crate) enum Strategy {
    EventDriven(EventDriven),
    Estimated(Estimated),
}

impl Strategy {
    pub(crate) const fn for_kind(kind: CompletionKind) -> Self {
        match kind {
            CompletionKind::EventDriven => Strategy::EventDriven(EventDriven::new()),
            CompletionKind::Estimated => Strategy::Estimated(Estimated::new()),
        }
    }

    /// Buffer currently owned by the hardware, if the strategy tracks one.
    pub(crate) fn active(&self) -> Option<BufferId> {
        match self {
            Strategy::EventDriven(s) => s.active(),
            Strategy::Estimated(_) => None,
        }
    }
}

impl CompletionStrategy for Strategy {
    fn submitted<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        outbox: &Outbox<'_, S, N>,
        id: BufferId,
        was_empty: bool,
    ) -> Result<(), B::Error> {
        match self {
            Strategy::EventDriven(s) => s.submitted(pipeline, outbox, id, was_empty),
            Strategy::Estimated(s) => s.submitted(pipeline, outbox, id, was_empty),
        }
    }

    fn transfer_complete<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        outbox: &Outbox<'_, S, N>,
    ) -> Result<(), B::Error> {
        match self {
            Strategy::EventDriven(s) => s.transfer_complete(pipeline, outbox),
            Strategy::Estimated(s) => s.transfer_complete(pipeline, outbox),
        }
    }

    fn timer_expired<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        outbox: &Outbox<'_, S, N>,
    ) -> Result<(), B::Error> {
        match self {
            Strategy::EventDriven(s) => s.timer_expired(pipeline, outbox),
            Strategy::Estimated(s) => s.timer_expired(pipeline, outbox),
        }
    }

    fn withdraw<B: Backend, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        id: BufferId,
    ) -> bool {
        match self {
            Strategy::EventDriven(s) => s.withdraw(pipeline, id),
            Strategy::Estimated(s) => s.withdraw(pipeline, id),
        }
    }

    fn reset<B: Backend, const N: usize>(&mut self, pipeline: &mut Pipeline<'_, B, N>) {
        match self {
            Strategy::EventDriven(s) => s.reset(pipeline),
            Strategy::Estimated(s) => s.reset(pipeline),
        }
    }
}
