// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compact per-thread identifiers that fit in an atomic.
//!
//! `std::thread::ThreadId` has no stable integer form, so records store a
//! [`ThreadToken`] instead. Tokens are handed out from a process-wide counter
//! the first time a thread touches the registry and are never reused.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: NonZeroU64 = next_token();
}

fn next_token() -> NonZeroU64 {
    let raw = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    // The counter starts at 1 and would need 2^64 threads to wrap.
    NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN)
}

/// Identifier of an OS thread as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadToken(NonZeroU64);

impl ThreadToken {
    /// Token of the calling thread.
    pub fn current() -> Self {
        Self(CURRENT.with(|t| *t))
    }

    /// Raw value stored in record atomics.
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Decodes a stored slot; `0` means "no thread".
    pub(crate) fn from_slot(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }
}

impl std::fmt::Display for ThreadToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}
