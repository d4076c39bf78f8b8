// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sources of time for the acquisition workers.

use std::{sync::Arc, time::SystemTime};

use crossbeam_utils::atomic::AtomicCell;
use hifitime::{Duration, Epoch};

/// Something that tells the time and can wait. Every worker stamps its output
/// with its own clock; all clocks in a run must share the same origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Epoch;

    fn sleep(&self, duration: Duration);
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Epoch {
        let unix = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Epoch::from_unix_seconds(unix)
    }

    fn sleep(&self, duration: Duration) {
        let seconds = duration.to_seconds();
        if seconds > 0.0 {
            std::thread::sleep(std::time::Duration::from_secs_f64(seconds));
        }
    }
}

/// A clock that only moves when something sleeps on it. Clones share the same
/// time, so a simulated device can advance the clock of the worker that owns
/// it.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now: Arc<AtomicCell<Epoch>>,
}

impl SimulatedClock {
    pub fn new(start: Epoch) -> SimulatedClock {
        SimulatedClock {
            now: Arc::new(AtomicCell::new(start)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let now = self.now.load();
        self.now.store(now + duration);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Epoch {
        self.now.load()
    }

    fn sleep(&self, duration: Duration) {
        if duration > Duration::ZERO {
            self.advance(duration);
        }
    }
}
