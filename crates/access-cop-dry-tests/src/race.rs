// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Thread races released through a shared start gate.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

/// One-shot start signal. Waiters learn whether to run or to stand down.
#[derive(Default)]
struct StartGate {
    state: Mutex<Option<bool>>,
    opened: Condvar,
}

impl StartGate {
    fn open(&self, go: bool) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(go);
        self.opened.notify_all();
    }

    fn wait(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = self
            .opened
            .wait_while(state, |s| s.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        (*state).unwrap_or(false)
    }
}

/// Runs `body(i)` on `threads` fresh threads released together.
///
/// Returns each thread's outcome in spawn order; a panicking body yields
/// `Err(payload)`, ready for [`violation_of`](crate::violation_of).
///
/// Bodies start only once every thread has spawned. If any spawn fails,
/// no body runs and every outcome is an error.
pub fn race<T, F>(threads: usize, body: F) -> Vec<thread::Result<T>>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    let gate = Arc::new(StartGate::default());
    let body = Arc::new(body);
    let spawned: Vec<_> = (0..threads)
        .map(|i| {
            let gate = Arc::clone(&gate);
            let body = Arc::clone(&body);
            thread::Builder::new()
                .name(format!("race-{i}"))
                .spawn(move || gate.wait().then(|| body(i)))
        })
        .collect();
    gate.open(spawned.iter().all(Result::is_ok));
    spawned
        .into_iter()
        .map(|spawned| match spawned {
            Ok(handle) => match handle.join() {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(Box::new("race aborted: a sibling failed to spawn")
                    as Box<dyn std::any::Any + Send>),
                Err(payload) => Err(payload),
            },
            Err(err) => Err(Box::new(err) as Box<dyn std::any::Any + Send>),
        })
        .collect()
}
