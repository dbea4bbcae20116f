// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scoped bracketing: release runs on every exit path.

use tracing::warn;

use crate::identity::{Identity, MonitorTarget};
use crate::policy::{AccessKind, Policy};
use crate::registry::Registry;
use crate::violation::Violation;

/// An open bracketed access. Dropping it performs the matching `leave`.
///
/// If the guarded body is already unwinding, a failing `leave` is logged and
/// swallowed so the body's own panic propagates unchanged. Outside of
/// unwinding, a failing `leave` raises its violation like
/// [`Registry::leave`].
#[must_use = "dropping the guard immediately ends the bracketed access"]
pub struct AccessGuard<'r> {
    registry: &'r Registry,
    identity: Identity,
    tracked: bool,
}

impl std::fmt::Debug for AccessGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("identity", &self.identity)
            .field("tracked", &self.tracked)
            .finish_non_exhaustive()
    }
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        // Nothing is owed when entry did not take the holder slot.
        if !self.tracked {
            return;
        }
        if std::thread::panicking() {
            if let Err(violation) = self.registry.try_leave(&self.identity) {
                warn!(%violation, "release failed while unwinding");
            }
        } else {
            self.registry.leave(&self.identity);
        }
    }
}

/// A pushed policy override. Dropping it performs the matching `pop`.
#[must_use = "dropping the scope immediately restores the previous policy"]
pub struct PolicyScope<'r> {
    registry: &'r Registry,
    identity: Identity,
}

impl std::fmt::Debug for PolicyScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyScope")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Drop for PolicyScope<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Err(violation) = self.registry.try_pop(&self.identity) {
                warn!(%violation, "policy restore failed while unwinding");
            }
        } else {
            self.registry.pop(&self.identity);
        }
    }
}

impl Registry {
    /// Opens a bracketed access released when the guard drops.
    pub fn try_guard<M>(&self, target: &M, kind: AccessKind) -> Result<AccessGuard<'_>, Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let tracked = self.enter_tracked(&identity, kind)?;
        Ok(AccessGuard {
            registry: self,
            identity,
            tracked,
        })
    }

    /// Opens a bracketed access released when the guard drops.
    ///
    /// # Panics
    ///
    /// Raises the entry violation like [`enter`](Self::enter).
    pub fn guard<M>(&self, target: &M, kind: AccessKind) -> AccessGuard<'_>
    where
        M: MonitorTarget + ?Sized,
    {
        match self.try_guard(target, kind) {
            Ok(guard) => guard,
            Err(violation) => std::panic::panic_any(violation),
        }
    }

    /// Runs `body` inside a bracketed access to `target`.
    ///
    /// Whatever `body` returns or panics with reaches the caller unchanged.
    pub fn with_access<M, R>(&self, target: &M, kind: AccessKind, body: impl FnOnce() -> R) -> R
    where
        M: MonitorTarget + ?Sized,
    {
        let _guard = self.guard(target, kind);
        body()
    }

    /// Pushes `policy` onto `target` until the scope drops.
    pub fn try_scoped_policy<M>(&self, target: &M, policy: Policy) -> Result<PolicyScope<'_>, Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        self.try_push(&identity, policy)?;
        Ok(PolicyScope {
            registry: self,
            identity,
        })
    }

    /// Pushes `policy` onto `target` until the scope drops.
    ///
    /// # Panics
    ///
    /// Raises the push violation like [`push`](Self::push).
    pub fn scoped_policy<M>(&self, target: &M, policy: Policy) -> PolicyScope<'_>
    where
        M: MonitorTarget + ?Sized,
    {
        match self.try_scoped_policy(target, policy) {
            Ok(scope) => scope,
            Err(violation) => std::panic::panic_any(violation),
        }
    }
}
