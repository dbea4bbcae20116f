// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic fault injection for provoking races in tests.
//!
//! Instrumented code calls [`FaultInjector::pause`] and
//! [`FaultInjector::check_exception`] at named checkpoints. Both are no-ops
//! until a test configures the location, so checkpoints can stay in place.
//!
//! The pause map and the armed set are independent: configuring one never
//! affects the other.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::violation::ForcedFailure;

/// Named-location pause and one-shot failure triggers.
#[derive(Debug, Default)]
pub struct FaultInjector {
    pauses: Mutex<FxHashMap<String, Duration>>,
    armed: Mutex<FxHashSet<String>>,
}

impl FaultInjector {
    /// Empty injector: every checkpoint is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sleep for `location`; a zero duration clears it.
    pub fn add_pause(&self, location: impl Into<String>, duration: Duration) {
        let location = location.into();
        let mut pauses = self.pauses.lock().unwrap_or_else(PoisonError::into_inner);
        if duration.is_zero() {
            pauses.remove(&location);
        } else {
            pauses.insert(location, duration);
        }
    }

    /// Configured pause for `location`, if any.
    pub fn pause_for(&self, location: &str) -> Option<Duration> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .copied()
    }

    /// Sleeps the calling thread for the duration configured at `location`.
    ///
    /// The map lock is released before sleeping.
    pub fn pause(&self, location: &str) {
        if let Some(duration) = self.pause_for(location) {
            trace!(location, ?duration, "fault pause");
            std::thread::sleep(duration);
        }
    }

    /// Arms a one-shot failure at `location`.
    pub fn arm_exception(&self, location: impl Into<String>) {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.into());
    }

    /// Whether `location` is currently armed.
    pub fn is_armed(&self, location: &str) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(location)
    }

    /// Disarms `location` and reports whether this call did the disarming.
    ///
    /// Among any number of concurrent callers for one armed location, exactly
    /// one gets `true`.
    pub fn check_exception(&self, location: &str) -> bool {
        let fired = self
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(location);
        if fired {
            trace!(location, "fault fired");
        }
        fired
    }

    /// [`check_exception`](Self::check_exception) as an error value, for
    /// instrumented code that propagates with `?`.
    pub fn trip(&self, location: &str) -> Result<(), ForcedFailure> {
        if self.check_exception(location) {
            return Err(ForcedFailure {
                location: location.to_owned(),
            });
        }
        Ok(())
    }

    /// Clears every pause and every armed location.
    pub fn clear_all(&self) {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
