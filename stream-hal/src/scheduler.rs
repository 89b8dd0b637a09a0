//! Bridge to the cooperative task runtime.
//!
//! The device never calls into suspended tasks directly. Completions are
//! queued on the device and the runtime is poked through [`Scheduler::notify`];
//! the runtime then calls [`Device::dispatch`](crate::device::Device::dispatch)
//! from task context, which wakes the waiting tasks.
//!
//! ```ignore
//! loop {
//!     while device.dispatch().is_some() {}
//!     if timer_expired() {
//!         device.on_timer();
//!     }
//!     executor.run_ready_tasks();
//!     wait_for_interrupt();
//! }
//! ```

use core::time::Duration;

/// Runtime services a device needs.
///
/// Both methods are called while the device holds its exclusive region, and
/// possibly from interrupt context. They must not block and must not call
/// back into the device.
pub trait Scheduler {
    /// Arm a one-shot timer. When it fires the runtime calls
    /// [`Device::on_timer`](crate::device::Device::on_timer). A new call
    /// replaces a timer that has not fired yet.
    fn arm_timer(&self, after: Duration);

    /// A completion has been queued; make sure `dispatch` runs soon.
    fn notify(&self) {}
}

impl<T: Scheduler + ?Sized> Scheduler for &T {
    fn arm_timer(&self, after: Duration) {
        (**self).arm_timer(after)
    }

    fn notify(&self) {
        (**self).notify()
    }
}

/// For event-driven devices, which never arm timers.
impl Scheduler for () {
    fn arm_timer(&self, after: Duration) {
        log::error!("timer requested ({} ms) but no scheduler is attached", after.as_millis());
    }
}
