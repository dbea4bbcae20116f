// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Violation taxonomy.
//!
//! A [`Violation`] is raised the instant a declared contract is broken. The
//! panicking registry entry points deliver it with [`std::panic::panic_any`],
//! so tests and supervisors can match it with `downcast_ref::<Violation>()`.
//! The `try_*` entry points return it as an error value instead.
//!
//! Violations are programmer errors, not recoverable runtime conditions: the
//! registry never retries or suppresses them. Every instance is counted and
//! recorded by [`Diagnostics`](crate::Diagnostics) before it reaches the caller.

use crate::policy::{AccessKind, Policy};
use crate::thread_token::ThreadToken;

/// Which rule was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// Two threads overlapped on an externally-synchronized object, or a
    /// thread released a bracket held by another thread.
    ConcurrentAccess,
    /// A thread other than the owner touched an owner-only object.
    WrongThread,
    /// A modification was attempted on a read-only object.
    ReadOnly,
    /// `leave` ran without a matching `enter`.
    NeverEntered,
    /// A non-owner tried to reassign the policy while an access was outstanding.
    OwnershipChangedByNonOwner,
}

impl ViolationKind {
    /// Stable, grep-friendly code for logs.
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConcurrentAccess => "CONCURRENT_ACCESS",
            Self::WrongThread => "WRONG_THREAD",
            Self::ReadOnly => "READ_ONLY",
            Self::NeverEntered => "NEVER_ENTERED",
            Self::OwnershipChangedByNonOwner => "OWNERSHIP_CHANGED_BY_NON_OWNER",
        }
    }

    const fn summary(self) -> &'static str {
        match self {
            Self::ConcurrentAccess => "overlapping access to an externally-synchronized object",
            Self::WrongThread => "access from a thread that does not own the object",
            Self::ReadOnly => "modification of a read-only object",
            Self::NeverEntered => "leave without a matching enter",
            Self::OwnershipChangedByNonOwner => {
                "policy reassigned by a non-owner while an access was outstanding"
            }
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.summary())
    }
}

/// A broken access contract, with the state observed when it was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} (target {target:#x}, policy {policy}, thread {thread})")]
pub struct Violation {
    /// Which rule was broken.
    pub kind: ViolationKind,
    /// Position in the owning registry's violation sequence, starting at 1.
    pub serial: u64,
    /// Address identifying the guarded object.
    pub target: usize,
    /// Generation stamp of the record that was checked.
    pub generation: u64,
    /// Policy in force at detection time.
    pub policy: Policy,
    /// The attempted access, if the violating call carried one.
    pub access: Option<AccessKind>,
    /// Thread that broke the contract.
    pub thread: ThreadToken,
    /// Name of that thread, when it has one.
    pub thread_name: Option<String>,
    /// Owner recorded on the target.
    pub owner: Option<ThreadToken>,
    /// Thread inside a bracketed access on the target, if any.
    pub holder: Option<ThreadToken>,
}

/// The state a violation is built from, before it is numbered.
#[derive(Debug, Clone)]
pub(crate) struct ViolationContext {
    pub(crate) kind: ViolationKind,
    pub(crate) target: usize,
    pub(crate) generation: u64,
    pub(crate) policy: Policy,
    pub(crate) access: Option<AccessKind>,
    pub(crate) owner: Option<ThreadToken>,
    pub(crate) holder: Option<ThreadToken>,
}

impl ViolationContext {
    pub(crate) fn into_violation(self, serial: u64) -> Violation {
        Violation {
            kind: self.kind,
            serial,
            target: self.target,
            generation: self.generation,
            policy: self.policy,
            access: self.access,
            thread: ThreadToken::current(),
            thread_name: std::thread::current().name().map(str::to_owned),
            owner: self.owner,
            holder: self.holder,
        }
    }
}

/// Failure forced by an armed fault-injection location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[FORCED_FAILURE] fault injected at `{location}`")]
pub struct ForcedFailure {
    /// The location that was armed.
    pub location: String,
}
