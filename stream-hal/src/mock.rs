//! Test doubles: backends that record what the core asks of them, and a
//! scheduler that records armed timers instead of running them.

use core::cell::{Cell, RefCell};
use core::time::Duration;
use std::vec::Vec;

use crate::backend::{Backend, CompletionKind};
use crate::config::DeviceConfig;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Init,
    /// Length and first byte of the submitted data.
    Submit(usize, u8),
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockError;

/// Peripheral that signals every finished buffer with an interrupt.
#[derive(Debug, Default)]
pub(crate) struct MockDma {
    pub(crate) calls: Vec<Call>,
    pub(crate) fail_init: bool,
    pub(crate) fail_submit: bool,
}

impl MockDma {
    pub(crate) fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    /// Marker (first byte) of every submitted buffer, in order.
    pub(crate) fn submitted(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Submit(_, marker) => Some(*marker),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn starts(&self) -> usize {
        self.count(Call::Start)
    }

    pub(crate) fn stops(&self) -> usize {
        self.count(Call::Stop)
    }
}

fn submit_call(data: &[u8]) -> Call {
    Call::Submit(data.len(), data.first().copied().unwrap_or(0))
}

impl Backend for MockDma {
    type Error = MockError;
    const COMPLETION: CompletionKind = CompletionKind::EventDriven;

    fn initialize(&mut self, _config: &DeviceConfig) -> Result<(), MockError> {
        self.calls.push(Call::Init);
        if self.fail_init {
            Err(MockError)
        } else {
            Ok(())
        }
    }

    fn submit(&mut self, data: &[u8]) -> Result<(), MockError> {
        if self.fail_submit {
            return Err(MockError);
        }
        self.calls.push(submit_call(data));
        Ok(())
    }

    fn start_engine(&mut self) {
        self.calls.push(Call::Start);
    }

    fn stop_engine(&mut self) {
        self.calls.push(Call::Stop);
    }
}

/// Host audio session that plays submitted frames in real time and only
/// reports its backlog.
#[derive(Debug, Default)]
pub(crate) struct MockHost {
    pub(crate) calls: Vec<Call>,
    pub(crate) sample_rate: u64,
    pub(crate) frame_bytes: u64,
    /// Frames accepted so far.
    pub(crate) queued: u64,
    /// Frames played so far.
    pub(crate) played: u64,
    pub(crate) fail_backlog: bool,
}

impl MockHost {
    /// Let `ms` milliseconds of playback pass.
    pub(crate) fn advance(&mut self, ms: u64) {
        let frames = ms * self.sample_rate / 1000;
        self.played = (self.played + frames).min(self.queued);
    }

    pub(crate) fn backlog(&self) -> u64 {
        self.queued - self.played
    }
}

impl Backend for MockHost {
    type Error = MockError;
    const COMPLETION: CompletionKind = CompletionKind::Estimated;

    fn initialize(&mut self, config: &DeviceConfig) -> Result<(), MockError> {
        self.calls.push(Call::Init);
        self.sample_rate = u64::from(config.sample_rate);
        self.frame_bytes = config.frame_bytes() as u64;
        Ok(())
    }

    fn submit(&mut self, data: &[u8]) -> Result<(), MockError> {
        self.calls.push(submit_call(data));
        self.queued += data.len() as u64 / self.frame_bytes;
        Ok(())
    }

    fn query_backlog(&mut self) -> Result<u32, MockError> {
        if self.fail_backlog {
            return Err(MockError);
        }
        Ok(self.backlog() as u32)
    }
}

/// Scheduler that remembers what it was asked to do.
#[derive(Debug, Default)]
pub(crate) struct ManualScheduler {
    pub(crate) timers: RefCell<Vec<Duration>>,
    pub(crate) notifications: Cell<usize>,
}

impl ManualScheduler {
    pub(crate) fn last_timer(&self) -> Option<Duration> {
        self.timers.borrow().last().copied()
    }

    pub(crate) fn timer_count(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Scheduler for ManualScheduler {
    fn arm_timer(&self, after: Duration) {
        self.timers.borrow_mut().push(after);
    }

    fn notify(&self) {
        self.notifications.set(self.notifications.get() + 1);
    }
}
