//! Completion signalled by the peripheral.
//!
//! The peripheral raises an interrupt each time it has consumed (or filled)
//! the buffer it was given, e.g. a DMA pointer-update event. Double-buffered
//! engines take the pointer of the next buffer while the current one is still
//! running, so the buffer at the front of the queue is handed over
//! (preloaded) as soon as it is queued. The handler retires the active buffer,
//! promotes the preloaded one and preloads the buffer after it. As long as the
//! application keeps one buffer queued behind the active one the engine never
//! runs dry.
//!
//! ```text
//!   queue: [B2, B3]      active: B1     (hardware playing B1, B2 preloaded)
//!            │ event
//!            ▼
//!   queue: [B3]          active: B2     (B1 → Ready, B3 preloaded)
//!            │ event, event
//!            ▼
//!   queue: []            active: -      (engine stopped: underrun)
//! ```

use crate::backend::Backend;
use crate::buffer::BufferId;
use crate::pipeline::{Outbox, Pipeline};
use crate::scheduler::Scheduler;

use super::CompletionStrategy;

/// While `active` is `None` the queue is empty; otherwise its front, if any,
/// has already been submitted.
#[derive(Debug, Default)]
pub(crate) struct EventDriven {
    /// Buffer the hardware is working on.
    active: Option<BufferId>,
    /// Engine started and not stopped since.
    running: bool,
}

impl EventDriven {
    pub(crate) const fn new() -> Self {
        EventDriven {
            active: None,
            running: false,
        }
    }

    pub(crate) fn active(&self) -> Option<BufferId> {
        self.active
    }

    /// Hand the queue front to the hardware as its next buffer.
    fn preload<B: Backend, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
    ) -> Result<(), B::Error> {
        match pipeline.queue.front() {
            Some(next) => pipeline.submit(next),
            None => Ok(()),
        }
    }
}

impl CompletionStrategy for EventDriven {
    fn submitted<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        _outbox: &Outbox<'_, S, N>,
        id: BufferId,
        was_empty: bool,
    ) -> Result<(), B::Error> {
        // Behind a preloaded buffer: waits for the next event
        if !was_empty {
            return Ok(());
        }
        if self.active.is_some() {
            return pipeline.submit(id);
        }

        pipeline.queue.pop_front();
        self.active = Some(id);
        pipeline.submit(id)?;
        if !self.running {
            pipeline.backend.start_engine();
            self.running = true;
            log::debug!("transfer engine started");
        }
        Ok(())
    }

    fn transfer_complete<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        outbox: &Outbox<'_, S, N>,
    ) -> Result<(), B::Error> {
        if let Some(done) = self.active.take() {
            pipeline.complete(done, outbox);
        }
        match pipeline.queue.pop_front() {
            Some(next) => {
                self.active = Some(next);
                self.preload(pipeline)?;
            }
            None if self.running => {
                pipeline.backend.stop_engine();
                self.running = false;
                pipeline.stats.underruns = pipeline.stats.underruns.wrapping_add(1);
                log::debug!("transfer queue drained, engine stopped");
            }
            None => {}
        }
        Ok(())
    }

    fn withdraw<B: Backend, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        id: BufferId,
    ) -> bool {
        // The hardware already holds the active and the preloaded buffer
        self.active != Some(id) && pipeline.queue.front() != Some(id) && pipeline.queue.remove(id)
    }

    fn reset<B: Backend, const N: usize>(&mut self, pipeline: &mut Pipeline<'_, B, N>) {
        self.active = None;
        if self.running {
            pipeline.backend.stop_engine();
            self.running = false;
        }
    }
}
