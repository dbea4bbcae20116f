// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-object contract state.
//!
//! The registry's table lock only protects lookup. A record's holder/depth
//! fields are mutated by whichever thread performs a bracketed access while
//! the table is held for reading, so every mutable field here is an atomic.
//! The policy rules guarantee logical exclusivity; the atomics guarantee
//! memory safety when a contract is broken anyway.
//!
//! `policy`, `owner` and `policy_stack` are only written while the table is
//! held for writing.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::policy::Policy;
use crate::thread_token::ThreadToken;

/// Outcome of trying to claim the holder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// The slot was empty; the caller now holds at depth 1.
    Acquired,
    /// The caller already held the slot; depth was incremented.
    Reentered,
    /// Another thread holds the slot.
    HeldBy(ThreadToken),
}

/// Outcome of releasing one level of the holder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// Depth dropped but the caller still holds.
    Nested,
    /// Depth reached zero and the slot was cleared.
    Cleared,
    /// Nobody holds the slot.
    NotHeld,
    /// Another thread holds the slot.
    HeldBy(ThreadToken),
}

#[derive(Debug)]
pub(crate) struct Record {
    generation: u64,
    policy: AtomicU8,
    owner: AtomicU64,
    holder: AtomicU64,
    depth: AtomicU32,
    policy_stack: Mutex<Vec<Policy>>,
}

impl Record {
    pub(crate) fn new(generation: u64, policy: Policy, owner: ThreadToken) -> Self {
        Self {
            generation,
            policy: AtomicU8::new(policy.to_bits()),
            owner: AtomicU64::new(owner.get()),
            holder: AtomicU64::new(0),
            depth: AtomicU32::new(0),
            policy_stack: Mutex::new(Vec::new()),
        }
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    /// Current policy, or `None` if the stored byte is not a known policy.
    pub(crate) fn policy(&self) -> Option<Policy> {
        Policy::from_bits(self.policy.load(Ordering::Acquire))
    }

    /// Policy for reporting; unknown bytes read as `Disabled`.
    pub(crate) fn policy_or_disabled(&self) -> Policy {
        self.policy().unwrap_or_default()
    }

    pub(crate) fn owner(&self) -> Option<ThreadToken> {
        ThreadToken::from_slot(self.owner.load(Ordering::Acquire))
    }

    pub(crate) fn holder(&self) -> Option<ThreadToken> {
        ThreadToken::from_slot(self.holder.load(Ordering::Acquire))
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth.load(Ordering::Acquire)
    }

    /// Stores a new policy and owner. Caller holds the table write lock.
    pub(crate) fn assign(&self, policy: Policy, owner: ThreadToken) {
        self.policy.store(policy.to_bits(), Ordering::Release);
        self.owner.store(owner.get(), Ordering::Release);
    }

    /// Whether `caller` may reassign this record to `policy`.
    ///
    /// Ownership moves to a different thread only while no bracketed access
    /// is outstanding, unless monitoring is being switched off.
    pub(crate) fn may_reassign(&self, caller: ThreadToken, policy: Policy) -> bool {
        self.owner() == Some(caller) || self.depth() == 0 || policy == Policy::Disabled
    }

    pub(crate) fn claim(&self, caller: ThreadToken) -> Claim {
        match self
            .holder
            .compare_exchange(0, caller.get(), Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.depth.store(1, Ordering::Release);
                Claim::Acquired
            }
            Err(current) if current == caller.get() => {
                self.depth.fetch_add(1, Ordering::AcqRel);
                Claim::Reentered
            }
            // A strong exchange never fails against an empty slot.
            Err(current) => ThreadToken::from_slot(current).map_or(Claim::HeldBy(caller), Claim::HeldBy),
        }
    }

    pub(crate) fn release(&self, caller: ThreadToken) -> Release {
        let current = self.holder.load(Ordering::Acquire);
        if current == 0 {
            return Release::NotHeld;
        }
        if current != caller.get() {
            return ThreadToken::from_slot(current).map_or(Release::NotHeld, Release::HeldBy);
        }
        // Only the holder reaches this point, so depth cannot move under us.
        let previous = self.depth.fetch_sub(1, Ordering::AcqRel);
        if previous <= 1 {
            self.depth.store(0, Ordering::Release);
            self.holder.store(0, Ordering::Release);
            Release::Cleared
        } else {
            Release::Nested
        }
    }

    pub(crate) fn push_policy(&self, previous: Policy) {
        self.policy_stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(previous);
    }

    pub(crate) fn pop_policy(&self) -> Option<Policy> {
        self.policy_stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    pub(crate) fn stack_depth(&self) -> usize {
        self.policy_stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
