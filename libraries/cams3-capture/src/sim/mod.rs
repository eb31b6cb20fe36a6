//! Simulated drivers with fault injection
//!
//! Host-side stand-ins for the board's camera, PDM channel, SD volume, clock, and
//! LED. Each one records what the pipeline did to it (outstanding frames, channel
//! lifetime, bytes written) so tests can assert on resource release, and each can
//! be told to fail at a specific step.

mod camera;
mod pdm;
mod volume;

pub use camera::SimCamera;
pub use pdm::{Signal, SimPdm};
pub use volume::SimVolume;

use cams3_core::{Clock, Indicator};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Hand-driven clock shared between clones.
///
/// The simulated PDM channel advances it by the audio time it delivers, so
/// recordings run instantly but still observe their deadlines.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(millis: u64) -> Self {
        let clock = Self::new();
        clock.set(millis);
        clock
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// LED whose state can be observed through any clone
#[derive(Debug, Clone, Default)]
pub struct SimLed {
    on: Arc<AtomicBool>,
}

impl SimLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

impl Indicator for SimLed {
    fn set(&mut self, on: bool) {
        self.on.store(on, Ordering::SeqCst);
    }
}
