//! Exclusive regions: scoped masking of the interrupt that shares state with
//! task context.
//!
//! A device never uses a lock. Every mutation of its queue and registry
//! happens between [`ExclusiveRegion::enter`] and [`ExclusiveRegion::exit`],
//! which on a microcontroller disable and re-enable the peripheral's
//! interrupt line. [`RegionGuard`] pairs the two calls so the region is left on
//! every exit path, including early returns and unwinding.
//!
//! | Region | Masks | Availability |
//! |--------|-------|--------------|
//! | [`CriticalSection`] | everything, via the `critical-section` crate | always |
//! | [`NvicMask`] | one NVIC interrupt line | feature `cortex-m` |

/// A platform primitive granting exclusive access against one interrupt
/// source.
pub trait ExclusiveRegion {
    /// Whatever `exit` needs to restore the previous masking state.
    type State;

    /// Mask the interrupt source.
    fn enter(&self) -> Self::State;

    /// Restore the masking state saved by `enter`.
    ///
    /// # Safety
    ///
    /// `state` must come from the matching `enter` on this region, and
    /// nested regions must be exited in reverse order of entry.
    unsafe fn exit(&self, state: Self::State);

    /// Enter the region for as long as the returned guard lives.
    fn lock(&self) -> RegionGuard<'_, Self>
    where
        Self: Sized,
    {
        RegionGuard {
            region: self,
            state: Some(self.enter()),
        }
    }
}

impl<R: ExclusiveRegion> ExclusiveRegion for &R {
    type State = R::State;

    fn enter(&self) -> Self::State {
        (**self).enter()
    }

    unsafe fn exit(&self, state: Self::State) {
        unsafe { (**self).exit(state) }
    }
}

/// RAII guard returned by [`ExclusiveRegion::lock`].
#[must_use = "the region is left as soon as the guard is dropped"]
pub struct RegionGuard<'r, R: ExclusiveRegion> {
    region: &'r R,
    state: Option<R::State>,
}

impl<R: ExclusiveRegion> Drop for RegionGuard<'_, R> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            // SAFETY: `state` came from `enter` in `lock`, and guards are
            // dropped in reverse order of creation.
            unsafe { self.region.exit(state) }
        }
    }
}

/// Global critical section from the [`critical_section`] crate.
///
/// Masks every interrupt on single-core targets. The application links an
/// implementation, e.g. `cortex-m`'s `critical-section-single-core` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriticalSection;

impl ExclusiveRegion for CriticalSection {
    type State = critical_section::RestoreState;

    fn enter(&self) -> Self::State {
        // SAFETY: the matching release happens in `exit`, called by the guard.
        unsafe { critical_section::acquire() }
    }

    unsafe fn exit(&self, state: Self::State) {
        unsafe { critical_section::release(state) }
    }
}

#[cfg(feature = "cortex-m")]
pub use nvic::NvicMask;

#[cfg(feature = "cortex-m")]
mod nvic {
    use cortex_m::interrupt::InterruptNumber;
    use cortex_m::peripheral::NVIC;

    use super::ExclusiveRegion;

    /// Masks a single NVIC interrupt line, leaving higher-priority and
    /// unrelated interrupts running.
    #[derive(Debug, Clone, Copy)]
    pub struct NvicMask<I> {
        irq: I,
    }

    impl<I: InterruptNumber> NvicMask<I> {
        pub const fn new(irq: I) -> Self {
            NvicMask { irq }
        }
    }

    impl<I: InterruptNumber> ExclusiveRegion for NvicMask<I> {
        /// Whether the line was enabled on entry.
        type State = bool;

        fn enter(&self) -> bool {
            let enabled = NVIC::is_enabled(self.irq);
            NVIC::mask(self.irq);
            enabled
        }

        unsafe fn exit(&self, enabled: bool) {
            if enabled {
                // SAFETY: the line was enabled before `enter`; restoring it
                // cannot break a mask-based critical section we do not own.
                unsafe { NVIC::unmask(self.irq) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Region that counts nesting depth instead of masking anything.
    #[derive(Default)]
    struct Depth {
        depth: Cell<u32>,
        entries: Cell<u32>,
    }

    impl ExclusiveRegion for Depth {
        type State = u32;

        fn enter(&self) -> u32 {
            let previous = self.depth.get();
            self.depth.set(previous + 1);
            self.entries.set(self.entries.get() + 1);
            previous
        }

        unsafe fn exit(&self, previous: u32) {
            self.depth.set(previous);
        }
    }

    fn early_return(region: &Depth, bail: bool) -> u32 {
        let _guard = region.lock();
        if bail {
            return region.depth.get();
        }
        region.depth.get() * 10
    }

    #[test]
    fn guard_restores_on_drop() {
        let region = Depth::default();
        {
            let _outer = region.lock();
            assert_eq!(region.depth.get(), 1);
            {
                let _inner = region.lock();
                assert_eq!(region.depth.get(), 2);
            }
            assert_eq!(region.depth.get(), 1);
        }
        assert_eq!(region.depth.get(), 0);
        assert_eq!(region.entries.get(), 2);
    }

    #[test]
    fn guard_restores_on_early_return() {
        let region = Depth::default();
        assert_eq!(early_return(&region, true), 1);
        assert_eq!(region.depth.get(), 0);
        assert_eq!(early_return(&region, false), 10);
        assert_eq!(region.depth.get(), 0);
    }

    #[test]
    fn guard_restores_on_unwind() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let region = Depth::default();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = region.lock();
            panic!("inside region");
        }));
        assert!(result.is_err());
        assert_eq!(region.depth.get(), 0);
    }

    #[test]
    fn reference_regions_forward() {
        let region = Depth::default();
        let by_ref = &region;
        {
            let _guard = by_ref.lock();
            assert_eq!(region.depth.get(), 1);
        }
        assert_eq!(region.depth.get(), 0);
    }

    #[test]
    fn critical_section_nests() {
        let cs = CriticalSection;
        let _outer = cs.lock();
        let _inner = cs.lock();
    }
}
