//! Completion estimated from elapsed stream time.
//!
//! Host audio services typically take samples into their own ring and only
//! report how many frames are still queued. Each submission advances a
//! running stream position and stamps the buffer with the position of its
//! last frame; the position the hardware has actually reached is
//! `position - backlog`. Buffers whose stamp lies behind it are complete, and
//! a one-shot timer is armed for the time remaining until the oldest of the
//! rest is.

use crate::backend::Backend;
use crate::buffer::BufferId;
use crate::pipeline::{Outbox, Pipeline};
use crate::scheduler::Scheduler;

use super::CompletionStrategy;

#[derive(Debug, Default)]
pub(crate) struct Estimated {
    /// A poll is running or a timer is armed to run one.
    polling: bool,
}

impl Estimated {
    pub(crate) const fn new() -> Self {
        Estimated { polling: false }
    }

    /// Retire every elapsed buffer, then arm a timer for the next one.
    fn poll<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        outbox: &Outbox<'_, S, N>,
    ) -> Result<(), B::Error> {
        self.polling = true;

        let backlog = pipeline.backend.query_backlog()?;
        let current = pipeline.position.saturating_sub(u64::from(backlog));

        loop {
            let slots = &pipeline.slots;
            let elapsed = pipeline
                .queue
                .pop_front_if(|id| slots[id.index()].end_position <= current);
            match elapsed {
                Some(id) => pipeline.complete(id, outbox),
                None => break,
            }
        }

        match pipeline.queue.front() {
            Some(next) => {
                let remaining = pipeline.slots[next.index()].end_position - current;
                let after = pipeline.config.duration_for_frames(remaining);
                log::trace!("buffer {} elapses in {} ms", next.index(), after.as_millis());
                outbox.arm_timer(after);
            }
            None => self.polling = false,
        }
        Ok(())
    }
}

impl CompletionStrategy for Estimated {
    fn submitted<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        outbox: &Outbox<'_, S, N>,
        id: BufferId,
        _was_empty: bool,
    ) -> Result<(), B::Error> {
        pipeline.submit(id)?;
        pipeline.position += pipeline.frames(id);
        pipeline.slots[id.index()].end_position = pipeline.position;

        // An armed timer will get to this buffer
        if !self.polling {
            self.poll(pipeline, outbox)?;
        }
        Ok(())
    }

    fn timer_expired<B: Backend, S: Scheduler, const N: usize>(
        &mut self,
        pipeline: &mut Pipeline<'_, B, N>,
        outbox: &Outbox<'_, S, N>,
    ) -> Result<(), B::Error> {
        self.poll(pipeline, outbox)
    }

    /// Submitted samples already sit in the host's ring, so nothing can be
    /// taken back; the buffer completes when they have played.
    fn withdraw<B: Backend, const N: usize>(
        &mut self,
        _pipeline: &mut Pipeline<'_, B, N>,
        _id: BufferId,
    ) -> bool {
        false
    }

    fn reset<B: Backend, const N: usize>(&mut self, _pipeline: &mut Pipeline<'_, B, N>) {
        self.polling = false;
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::buffer::BufferState;
    use crate::config::{DeviceConfig, SampleFormat};
    use crate::mock::{ManualScheduler, MockHost};
    use crate::slot::Slot;
    use crate::spsc::SpscQueue;

    const FRAMES: usize = 4096;

    fn host() -> MockHost {
        MockHost {
            sample_rate: 48_000,
            frame_bytes: 2,
            ..MockHost::default()
        }
    }

    #[test]
    fn timer_covers_only_remaining_time() {
        let mut memory = [[0u8; FRAMES * 2]; 2];
        let [m0, m1] = &mut memory;
        let config = DeviceConfig::new(48_000, 1, SampleFormat::I16);
        let mut pipeline: Pipeline<'_, MockHost, 2> = Pipeline::new(config, host());
        for m in [m0, m1] {
            let mut slot = Slot::new(m, BufferState::Busy);
            slot.len = FRAMES * 2;
            assert!(pipeline.slots.push(slot).is_ok());
        }
        let scheduler = ManualScheduler::default();
        let completions = SpscQueue::new();
        let outbox = Outbox {
            scheduler: &scheduler,
            completions: &completions,
        };
        let mut strategy = Estimated::new();

        let b0 = BufferId::new(0);
        let b1 = BufferId::new(1);
        for id in [b0, b1] {
            let was_empty = pipeline.queue.push(id).unwrap();
            strategy.submitted(&mut pipeline, &outbox, id, was_empty).unwrap();
        }
        // Only the first submission polls
        assert_eq!(scheduler.timers.borrow().as_slice(), [Duration::from_millis(86)]);
        assert_eq!(pipeline.position, 2 * FRAMES as u64);

        pipeline.backend.advance(86);
        strategy.timer_expired(&mut pipeline, &outbox).unwrap();
        assert_eq!(completions.pop(), Some(b0));
        // 8192 - 86 * 48 = 4064 frames left of b1 -> 84.67 ms
        assert_eq!(scheduler.last_timer(), Some(Duration::from_millis(85)));

        pipeline.backend.advance(85);
        strategy.timer_expired(&mut pipeline, &outbox).unwrap();
        assert_eq!(completions.pop(), Some(b1));
        assert_eq!(scheduler.timer_count(), 2);
        assert!(!strategy.polling);
    }

    #[test]
    fn early_timer_rearms_without_completing() {
        let mut memory = [0u8; FRAMES * 2];
        let config = DeviceConfig::new(48_000, 1, SampleFormat::I16);
        let mut pipeline: Pipeline<'_, MockHost, 1> = Pipeline::new(config, host());
        let mut slot = Slot::new(&mut memory, BufferState::Busy);
        slot.len = FRAMES * 2;
        assert!(pipeline.slots.push(slot).is_ok());
        let scheduler = ManualScheduler::default();
        let completions = SpscQueue::new();
        let outbox = Outbox {
            scheduler: &scheduler,
            completions: &completions,
        };
        let mut strategy = Estimated::new();

        let b0 = BufferId::new(0);
        pipeline.queue.push(b0).unwrap();
        strategy.submitted(&mut pipeline, &outbox, b0, true).unwrap();

        pipeline.backend.advance(50);
        strategy.timer_expired(&mut pipeline, &outbox).unwrap();
        assert!(completions.is_empty());
        // 4096 - 2400 = 1696 frames -> 35.33 ms
        assert_eq!(scheduler.last_timer(), Some(Duration::from_millis(36)));
        assert_eq!(pipeline.slots[0].state, BufferState::Busy);
    }

    #[test]
    fn nothing_can_be_withdrawn() {
        let mut pipeline: Pipeline<'_, MockHost, 1> =
            Pipeline::new(DeviceConfig::default(), host());
        let mut strategy = Estimated::new();
        assert!(!strategy.withdraw(&mut pipeline, BufferId::new(0)));
    }
}
