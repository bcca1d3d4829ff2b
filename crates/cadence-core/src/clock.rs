//! Clock abstraction — monotonic seconds for playback timing.
//!
//! The engine never reads wall time directly. Every timing computation goes
//! through a `Clock` handed in at construction, so hosts with their own time
//! source (an audio context, a simulation loop) can drive the engine, and
//! tests can advance time by hand.

use std::time::Instant;

use parking_lot::Mutex;

/// Monotonic time source. `now()` never decreases.
pub trait Clock: Send + Sync {
    /// Current time in seconds from an arbitrary origin.
    fn now(&self) -> f64;
}

/// Process-lifetime clock backed by `std::time::Instant`.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock. Time only moves when told to.
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(0.0),
        }
    }

    /// Move time forward by `dt` seconds. Negative steps are ignored.
    pub fn advance(&self, dt: f64) {
        if dt > 0.0 {
            *self.now.lock() += dt;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
