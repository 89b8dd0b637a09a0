//! Underrun indicator: a [`Backend`] wrapper that lights a pin while the
//! transfer engine is stopped.
//!
//! Engines stop when the application failed to queue the next buffer in time,
//! so on a board with a debug LED this shows underruns at a glance.
//!
//! ```ignore
//! let backend = Indicated::new(I2sBackend::new(), red_led);
//! ```

use embedded_hal::digital::OutputPin;

use crate::backend::{Backend, CompletionKind};
use crate::buffer::Op;
use crate::config::DeviceConfig;

pub struct Indicated<B, P> {
    backend: B,
    pin: P,
}

impl<B, P: OutputPin> Indicated<B, P> {
    pub const fn new(backend: B, pin: P) -> Self {
        Indicated { backend, pin }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_parts(self) -> (B, P) {
        (self.backend, self.pin)
    }

    fn signal(&mut self, stopped: bool) {
        let result = if stopped {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            log::warn!("indicator pin: {:?}", e);
        }
    }
}

impl<B: Backend, P: OutputPin> Backend for Indicated<B, P> {
    type Error = B::Error;
    const COMPLETION: CompletionKind = B::COMPLETION;
    const OPS: Op = B::OPS;

    fn initialize(&mut self, config: &DeviceConfig) -> Result<(), B::Error> {
        self.backend.initialize(config)
    }

    fn submit(&mut self, data: &[u8]) -> Result<(), B::Error> {
        self.backend.submit(data)
    }

    fn query_backlog(&mut self) -> Result<u32, B::Error> {
        self.backend.query_backlog()
    }

    fn start_engine(&mut self) {
        self.backend.start_engine();
        self.signal(false);
    }

    fn stop_engine(&mut self) {
        self.backend.stop_engine();
        self.signal(true);
    }
}
