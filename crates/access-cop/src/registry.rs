// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The access-contract registry.
//!
//! # Locking
//!
//! One reader/writer lock guards the identity table.
//!
//! - Structural operations ([`monitor`](Registry::monitor),
//!   [`push`](Registry::push), [`pop`](Registry::pop), [`sweep`](Registry::sweep))
//!   take the write side.
//! - Access checks ([`enter`](Registry::enter), [`leave`](Registry::leave),
//!   [`access`](Registry::access), [`current_policy`](Registry::current_policy))
//!   take only the read side for the whole check, yet update the record's
//!   holder/depth atomics. The table lock protects lookup; record content is
//!   kept race-free by the record's own atomics.
//!
//! Violations are assembled under the lock but numbered and reported after
//! it is released, so a sink may itself call back into the registry.
//!
//! # Raising
//!
//! Every check comes in two forms. `try_*` returns the [`Violation`] as an
//! error value. The plain form raises it with [`std::panic::panic_any`].
//! Either way the violation has already been counted and reported.

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::config::RegistryConfig;
use crate::diagnostics::{Diagnostics, TracingSink, ViolationSink};
use crate::fault::FaultInjector;
use crate::identity::{Identity, MonitorTarget};
use crate::policy::{AccessKind, Policy};
use crate::record::{Claim, Record, Release};
use crate::thread_token::ThreadToken;
use crate::violation::{Violation, ViolationContext, ViolationKind};

type Table = FxHashMap<usize, Entry>;

struct Entry {
    handle: Weak<dyn Any + Send + Sync>,
    record: Arc<Record>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.handle.strong_count() > 0
    }
}

/// Point-in-time view of one record, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSnapshot {
    /// Policy in force.
    pub policy: Policy,
    /// Thread that last assigned the policy.
    pub owner: Option<ThreadToken>,
    /// Thread inside a bracketed access, if any.
    pub holder: Option<ThreadToken>,
    /// Outstanding nested `enter` count of the holder.
    pub depth: u32,
    /// Number of policies saved by `push`.
    pub stacked: usize,
    /// Generation stamp assigned when the record was created.
    pub generation: u64,
}

/// Process-wide table of guarded objects and their access contracts.
///
/// Construct one per test or subsystem, or share [`Registry::global`].
pub struct Registry {
    table: RwLock<Table>,
    next_generation: AtomicU64,
    sweep_threshold: usize,
    // Table size that triggers the next implicit sweep. Kept at twice the
    // survivors of the last sweep so live-heavy tables are not rescanned.
    next_sweep: AtomicUsize,
    diagnostics: Diagnostics,
    faults: FaultInjector,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.len())
            .field("diagnostics", &self.diagnostics)
            .field("faults", &self.faults)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::panic)]
fn raise(violation: Violation) -> ! {
    std::panic::panic_any(violation)
}

impl Registry {
    /// Registry with default config, reporting to [`TracingSink`].
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Registry with `config`, reporting to [`TracingSink`].
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Registry with `config`, reporting to `sink`.
    pub fn with_sink(config: RegistryConfig, sink: Arc<dyn ViolationSink>) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            next_generation: AtomicU64::new(1),
            sweep_threshold: config.sweep_threshold,
            next_sweep: AtomicUsize::new(config.sweep_threshold),
            diagnostics: Diagnostics::new(sink, config.report_violations, config.capture_backtraces),
            faults: FaultInjector::new(),
        }
    }

    /// Lazily-created shared registry for hosts that want a single instance.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Violation counter, last-violation slot and sink.
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Fault-injection checkpoints owned by this registry.
    pub const fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Number of violations this registry has constructed.
    pub fn violation_count(&self) -> u64 {
        self.diagnostics.violation_count()
    }

    /// The most recent violation this registry constructed.
    pub fn last_violation(&self) -> Option<Violation> {
        self.diagnostics.last_violation()
    }

    fn read_table(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(table: &Table, addr: usize) -> Option<&Arc<Record>> {
        table
            .get(&addr)
            .filter(|entry| entry.is_live())
            .map(|entry| &entry.record)
    }

    fn context(
        record: &Record,
        addr: usize,
        kind: ViolationKind,
        access: Option<AccessKind>,
    ) -> ViolationContext {
        ViolationContext {
            kind,
            target: addr,
            generation: record.generation(),
            policy: record.policy_or_disabled(),
            access,
            owner: record.owner(),
            holder: record.holder(),
        }
    }

    fn escalate<T>(&self, outcome: Result<T, ViolationContext>) -> Result<T, Violation> {
        outcome.map_err(|context| self.diagnostics.raise(context))
    }

    fn maybe_sweep(&self, table: &mut Table) {
        if table.len() > self.next_sweep.load(Ordering::Relaxed) {
            let removed = self.sweep_locked(table);
            if removed > 0 {
                debug!(removed, remaining = table.len(), "swept stale records");
            }
        }
    }

    /// Sweeps `table` and moves the next implicit-sweep mark. Caller holds
    /// the write lock.
    fn sweep_locked(&self, table: &mut Table) -> usize {
        let removed = Self::sweep_table(table);
        let mark = self.sweep_threshold.max(table.len().saturating_mul(2));
        self.next_sweep.store(mark, Ordering::Relaxed);
        removed
    }

    #[cfg(test)]
    fn next_sweep_mark(&self) -> usize {
        self.next_sweep.load(Ordering::Relaxed)
    }

    fn sweep_table(table: &mut Table) -> usize {
        let before = table.len();
        table.retain(|_, entry| entry.is_live());
        before - table.len()
    }

    /// Returns the live record for `identity`, creating a `Disabled` one
    /// owned by `caller` if there is none.
    fn record_for<'t>(
        &self,
        table: &'t mut Table,
        identity: &Identity,
        caller: ThreadToken,
    ) -> &'t Arc<Record> {
        let addr = identity.addr();
        let stale = table.get(&addr).is_some_and(|entry| !entry.is_live());
        if stale {
            table.remove(&addr);
        }
        let entry = table.entry(addr).or_insert_with(|| {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            trace!(target_addr = addr, generation, "record created");
            Entry {
                handle: identity.downgrade(),
                record: Arc::new(Record::new(generation, Policy::Disabled, caller)),
            }
        });
        &entry.record
    }

    // ── Policy management ──────────────────────────────────────────────

    /// Assigns `policy` to `target`; see [`monitor`](Self::monitor).
    pub fn try_monitor<M>(&self, target: &M, policy: Policy) -> Result<(), Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let caller = ThreadToken::current();
        let outcome = {
            let mut table = self.write_table();
            self.maybe_sweep(&mut table);
            let record = self.record_for(&mut table, &identity, caller);
            if record.may_reassign(caller, policy) {
                let previous = record.policy_or_disabled();
                record.assign(policy, caller);
                debug!(
                    target_addr = identity.addr(),
                    %previous,
                    %policy,
                    owner = %caller,
                    "policy assigned"
                );
                Ok(())
            } else {
                Err(Self::context(
                    record,
                    identity.addr(),
                    ViolationKind::OwnershipChangedByNonOwner,
                    None,
                ))
            }
        };
        self.escalate(outcome)
    }

    /// Declares that `target` follows `policy`, making the calling thread its
    /// owner.
    ///
    /// Reassignment by a thread other than the current owner is refused while
    /// a bracketed access is outstanding, unless `policy` is
    /// [`Policy::Disabled`].
    ///
    /// # Panics
    ///
    /// Raises [`ViolationKind::OwnershipChangedByNonOwner`] as a [`Violation`] payload.
    pub fn monitor<M>(&self, target: &M, policy: Policy)
    where
        M: MonitorTarget + ?Sized,
    {
        if let Err(v) = self.try_monitor(target, policy) {
            raise(v);
        }
    }

    /// Saves the current policy and applies `policy`; see [`push`](Self::push).
    pub fn try_push<M>(&self, target: &M, policy: Policy) -> Result<(), Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let caller = ThreadToken::current();
        let outcome = {
            let mut table = self.write_table();
            self.maybe_sweep(&mut table);
            let record = self.record_for(&mut table, &identity, caller);
            if record.may_reassign(caller, policy) {
                let previous = record.policy_or_disabled();
                record.push_policy(previous);
                record.assign(policy, caller);
                debug!(
                    target_addr = identity.addr(),
                    %previous,
                    %policy,
                    stacked = record.stack_depth(),
                    "policy pushed"
                );
                Ok(())
            } else {
                Err(Self::context(
                    record,
                    identity.addr(),
                    ViolationKind::OwnershipChangedByNonOwner,
                    None,
                ))
            }
        };
        self.escalate(outcome)
    }

    /// Temporarily overrides the policy of `target`.
    ///
    /// Every `push` must be paired with exactly one [`pop`](Self::pop). Nothing
    /// unwinds an unpaired `push`; use [`scoped_policy`](Self::scoped_policy)
    /// when the pairing should survive early returns and panics.
    ///
    /// # Panics
    ///
    /// Raises [`ViolationKind::OwnershipChangedByNonOwner`] under the same
    /// rule as [`monitor`](Self::monitor).
    pub fn push<M>(&self, target: &M, policy: Policy)
    where
        M: MonitorTarget + ?Sized,
    {
        if let Err(v) = self.try_push(target, policy) {
            raise(v);
        }
    }

    /// Restores the most recently pushed policy; see [`pop`](Self::pop).
    pub fn try_pop<M>(&self, target: &M) -> Result<(), Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let caller = ThreadToken::current();
        let outcome = {
            let table = self.write_table();
            let Some(record) = Self::live(&table, identity.addr()) else {
                debug!(target_addr = identity.addr(), "pop on unmonitored target ignored");
                return Ok(());
            };
            let Some(restored) = record.pop_policy() else {
                debug!(target_addr = identity.addr(), "pop with empty policy stack ignored");
                return Ok(());
            };
            if record.may_reassign(caller, restored) {
                record.assign(restored, caller);
                debug!(
                    target_addr = identity.addr(),
                    policy = %restored,
                    stacked = record.stack_depth(),
                    "policy popped"
                );
                Ok(())
            } else {
                record.push_policy(restored);
                Err(Self::context(
                    record,
                    identity.addr(),
                    ViolationKind::OwnershipChangedByNonOwner,
                    None,
                ))
            }
        };
        self.escalate(outcome)
    }

    /// Restores the policy saved by the matching [`push`](Self::push).
    ///
    /// Popping with nothing saved is a silent no-op.
    ///
    /// # Panics
    ///
    /// Raises [`ViolationKind::OwnershipChangedByNonOwner`] under the same
    /// rule as [`monitor`](Self::monitor); the saved policy stays on the stack.
    pub fn pop<M>(&self, target: &M)
    where
        M: MonitorTarget + ?Sized,
    {
        if let Err(v) = self.try_pop(target) {
            raise(v);
        }
    }

    /// Policy governing `target`; [`Policy::Disabled`] when unregistered.
    pub fn current_policy<M>(&self, target: &M) -> Policy
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let table = self.read_table();
        Self::live(&table, identity.addr()).map_or(Policy::Disabled, |r| r.policy_or_disabled())
    }

    /// State of the record governing `target`, if it is registered.
    pub fn snapshot<M>(&self, target: &M) -> Option<RecordSnapshot>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let table = self.read_table();
        Self::live(&table, identity.addr()).map(|record| RecordSnapshot {
            policy: record.policy_or_disabled(),
            owner: record.owner(),
            holder: record.holder(),
            depth: record.depth(),
            stacked: record.stack_depth(),
            generation: record.generation(),
        })
    }

    /// Drops the record for `target`. Returns whether one was live.
    pub fn unmonitor<M>(&self, target: &M) -> bool
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let removed = self.write_table().remove(&identity.addr());
        let was_live = removed.is_some_and(|entry| entry.is_live());
        if was_live {
            debug!(target_addr = identity.addr(), "record dropped");
        }
        was_live
    }

    /// Evicts records whose objects have no strong owners left.
    /// Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut table = self.write_table();
        let removed = self.sweep_locked(&mut table);
        if removed > 0 {
            debug!(removed, remaining = table.len(), "swept stale records");
        }
        removed
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.read_table().values().filter(|e| e.is_live()).count()
    }

    /// Whether no live record exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Access checking ────────────────────────────────────────────────

    /// Opens a bracketed access. `Ok(true)` when the record now tracks the
    /// caller as holder and a `leave` is owed.
    pub(crate) fn enter_tracked<M>(&self, target: &M, kind: AccessKind) -> Result<bool, Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let addr = identity.addr();
        let outcome = {
            let table = self.read_table();
            match Self::live(&table, addr) {
                None => Ok(false),
                Some(record) => Self::check_enter(record, addr, kind),
            }
        };
        self.escalate(outcome)
    }

    fn check_enter(record: &Record, addr: usize, kind: AccessKind) -> Result<bool, ViolationContext> {
        let caller = ThreadToken::current();
        let policy = match record.policy() {
            // Unknown policy bytes fall through without a check.
            None | Some(Policy::Disabled) => return Ok(false),
            Some(p) => p,
        };
        match policy {
            Policy::ReadOnly if kind == AccessKind::Modify => Err(Self::context(
                record,
                addr,
                ViolationKind::ReadOnly,
                Some(kind),
            )),
            Policy::ReadOnly | Policy::Disabled => Ok(false),
            Policy::OwnerThreadOnly if record.owner() != Some(caller) => Err(Self::context(
                record,
                addr,
                ViolationKind::WrongThread,
                Some(kind),
            )),
            Policy::OwnerThreadOnly | Policy::ExternallySynchronized => {
                match record.claim(caller) {
                    Claim::Acquired | Claim::Reentered => {
                        trace!(target_addr = addr, %kind, depth = record.depth(), "enter");
                        Ok(true)
                    }
                    Claim::HeldBy(_) => Err(Self::context(
                        record,
                        addr,
                        ViolationKind::ConcurrentAccess,
                        Some(kind),
                    )),
                }
            }
        }
    }

    /// Opens a bracketed access; see [`enter`](Self::enter).
    pub fn try_enter<M>(&self, target: &M, kind: AccessKind) -> Result<(), Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        self.enter_tracked(target, kind).map(|_| ())
    }

    /// Opens a bracketed access to `target`.
    ///
    /// Under [`Policy::OwnerThreadOnly`] and [`Policy::ExternallySynchronized`]
    /// the caller becomes the holder (or deepens its hold). Every successful
    /// `enter` must be matched by a [`leave`](Self::leave), even when the
    /// bracketed work fails; [`guard`](Self::guard) does that automatically.
    ///
    /// # Panics
    ///
    /// Raises the [`Violation`] the policy table prescribes.
    pub fn enter<M>(&self, target: &M, kind: AccessKind)
    where
        M: MonitorTarget + ?Sized,
    {
        if let Err(v) = self.try_enter(target, kind) {
            raise(v);
        }
    }

    /// Closes a bracketed access; see [`leave`](Self::leave).
    pub fn try_leave<M>(&self, target: &M) -> Result<(), Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let addr = identity.addr();
        let outcome = {
            let table = self.read_table();
            match Self::live(&table, addr) {
                None => Ok(()),
                Some(record) => Self::check_leave(record, addr),
            }
        };
        self.escalate(outcome)
    }

    fn check_leave(record: &Record, addr: usize) -> Result<(), ViolationContext> {
        let caller = ThreadToken::current();
        let bracketed = record.policy().is_some_and(Policy::is_bracketed);
        match record.release(caller) {
            Release::Nested | Release::Cleared => {
                trace!(target_addr = addr, depth = record.depth(), "leave");
                Ok(())
            }
            Release::NotHeld if bracketed => Err(Self::context(
                record,
                addr,
                ViolationKind::NeverEntered,
                None,
            )),
            Release::HeldBy(_) if bracketed => Err(Self::context(
                record,
                addr,
                ViolationKind::ConcurrentAccess,
                None,
            )),
            Release::NotHeld | Release::HeldBy(_) => Ok(()),
        }
    }

    /// Closes one level of a bracketed access to `target`.
    ///
    /// A `leave` by the holder always unwinds its hold, whatever the policy
    /// has since become. Otherwise, under a thread-bound policy, leaving with
    /// no holder is [`ViolationKind::NeverEntered`] and leaving another
    /// thread's hold is [`ViolationKind::ConcurrentAccess`].
    ///
    /// # Panics
    ///
    /// Raises the violations described above.
    pub fn leave<M>(&self, target: &M)
    where
        M: MonitorTarget + ?Sized,
    {
        if let Err(v) = self.try_leave(target) {
            raise(v);
        }
    }

    /// One-shot check; see [`access`](Self::access).
    pub fn try_access<M>(&self, target: &M, kind: AccessKind) -> Result<(), Violation>
    where
        M: MonitorTarget + ?Sized,
    {
        let identity = target.monitor_identity();
        let addr = identity.addr();
        let outcome = {
            let table = self.read_table();
            match Self::live(&table, addr) {
                None => Ok(()),
                Some(record) => Self::check_access(record, addr, kind),
            }
        };
        self.escalate(outcome)
    }

    fn check_access(record: &Record, addr: usize, kind: AccessKind) -> Result<(), ViolationContext> {
        let caller = ThreadToken::current();
        let violation = match record.policy() {
            None | Some(Policy::Disabled) => None,
            Some(Policy::ReadOnly) => {
                (kind == AccessKind::Modify).then_some(ViolationKind::ReadOnly)
            }
            Some(Policy::OwnerThreadOnly) => {
                (record.owner() != Some(caller)).then_some(ViolationKind::WrongThread)
            }
            Some(Policy::ExternallySynchronized) => record
                .holder()
                .is_some_and(|holder| holder != caller)
                .then_some(ViolationKind::ConcurrentAccess),
        };
        match violation {
            Some(v) => Err(Self::context(record, addr, v, Some(kind))),
            None => Ok(()),
        }
    }

    /// Validates a single unbracketed access against the policy table.
    /// Changes no record state.
    ///
    /// # Panics
    ///
    /// Raises the [`Violation`] the policy table prescribes.
    pub fn access<M>(&self, target: &M, kind: AccessKind)
    where
        M: MonitorTarget + ?Sized,
    {
        if let Err(v) = self.try_access(target, kind) {
            raise(v);
        }
    }

    /// `access(target, AccessKind::Read)`.
    pub fn read<M>(&self, target: &M)
    where
        M: MonitorTarget + ?Sized,
    {
        self.access(target, AccessKind::Read);
    }

    /// `access(target, AccessKind::Modify)`.
    pub fn modify<M>(&self, target: &M)
    where
        M: MonitorTarget + ?Sized,
    {
        self.access(target, AccessKind::Modify);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn quiet() -> Registry {
        Registry::with_config(RegistryConfig {
            report_violations: false,
            capture_backtraces: false,
            ..RegistryConfig::default()
        })
    }

    #[test]
    fn unregistered_target_is_disabled_and_unchecked() {
        let reg = quiet();
        let obj = Arc::new(1_u8);
        assert_eq!(reg.current_policy(&obj), Policy::Disabled);
        reg.enter(&obj, AccessKind::Modify);
        reg.leave(&obj);
        reg.leave(&obj);
        reg.modify(&obj);
        assert_eq!(reg.violation_count(), 0);
        assert!(reg.is_empty());
    }

    #[test]
    fn read_only_rejects_modify_only() {
        let reg = quiet();
        let obj = Arc::new(vec![1, 2]);
        reg.monitor(&obj, Policy::ReadOnly);
        reg.read(&obj);
        assert!(reg.try_enter(&obj, AccessKind::Read).is_ok());
        let err = reg.try_access(&obj, AccessKind::Modify).unwrap_err();
        assert_eq!(err.kind, ViolationKind::ReadOnly);
        assert_eq!(err.access, Some(AccessKind::Modify));
        assert_eq!(reg.violation_count(), 1);
    }

    #[test]
    fn panicking_form_carries_violation_payload() {
        let reg = quiet();
        let obj = Arc::new(0_u32);
        reg.monitor(&obj, Policy::ReadOnly);
        let payload = catch_unwind(AssertUnwindSafe(|| reg.modify(&obj))).unwrap_err();
        let v = payload.downcast_ref::<Violation>().unwrap();
        assert_eq!(v.kind, ViolationKind::ReadOnly);
        assert_eq!(reg.last_violation().as_ref(), Some(v));
    }

    #[test]
    fn reentrant_enter_tracks_depth() {
        let reg = quiet();
        let obj = Arc::new(());
        reg.monitor(&obj, Policy::ExternallySynchronized);
        reg.enter(&obj, AccessKind::Read);
        reg.enter(&obj, AccessKind::Modify);
        let snap = reg.snapshot(&obj).unwrap();
        assert_eq!(snap.depth, 2);
        assert_eq!(snap.holder, Some(ThreadToken::current()));
        reg.leave(&obj);
        reg.leave(&obj);
        let snap = reg.snapshot(&obj).unwrap();
        assert_eq!(snap.depth, 0);
        assert_eq!(snap.holder, None);
    }

    #[test]
    fn leave_without_enter_is_never_entered() {
        let reg = quiet();
        for policy in [Policy::OwnerThreadOnly, Policy::ExternallySynchronized] {
            let obj = Arc::new(policy);
            reg.monitor(&obj, policy);
            let v = reg.try_leave(&obj).unwrap_err();
            assert_eq!(v.kind, ViolationKind::NeverEntered);
        }
        assert_eq!(reg.violation_count(), 2);
    }

    #[test]
    fn leave_is_a_no_op_under_unbracketed_policies() {
        let reg = quiet();
        let obj = Arc::new(0_i64);
        reg.monitor(&obj, Policy::ReadOnly);
        reg.leave(&obj);
        reg.monitor(&obj, Policy::Disabled);
        reg.leave(&obj);
        assert_eq!(reg.violation_count(), 0);
    }

    #[test]
    fn holder_unwinds_after_policy_switched_off() {
        let reg = quiet();
        let obj = Arc::new(0_i64);
        reg.monitor(&obj, Policy::ExternallySynchronized);
        reg.enter(&obj, AccessKind::Modify);
        reg.monitor(&obj, Policy::Disabled);
        reg.leave(&obj);
        assert_eq!(reg.snapshot(&obj).unwrap().holder, None);
    }

    #[test]
    fn push_pop_is_lifo_and_empty_pop_is_silent() {
        let reg = quiet();
        let obj = Arc::new(String::new());
        reg.push(&obj, Policy::ReadOnly);
        reg.push(&obj, Policy::OwnerThreadOnly);
        assert_eq!(reg.current_policy(&obj), Policy::OwnerThreadOnly);
        reg.pop(&obj);
        assert_eq!(reg.current_policy(&obj), Policy::ReadOnly);
        reg.pop(&obj);
        assert_eq!(reg.current_policy(&obj), Policy::Disabled);
        reg.pop(&obj);
        assert_eq!(reg.current_policy(&obj), Policy::Disabled);
        reg.pop(&Arc::new(0_u8));
        assert_eq!(reg.violation_count(), 0);
    }

    #[test]
    fn dropped_target_becomes_invisible_and_is_swept() {
        let reg = quiet();
        let obj = Arc::new(7_u16);
        let id = Identity::of(&obj);
        reg.monitor(&obj, Policy::ReadOnly);
        assert_eq!(reg.len(), 1);
        drop(obj);
        assert_eq!(reg.current_policy(&id), Policy::Disabled);
        assert_eq!(reg.len(), 0);
        assert_eq!(reg.sweep(), 1);
        assert_eq!(reg.sweep(), 0);
    }

    #[test]
    fn structural_ops_sweep_past_threshold() {
        let reg = Registry::with_config(RegistryConfig {
            report_violations: false,
            capture_backtraces: false,
            sweep_threshold: 2,
        });
        for _ in 0..3 {
            let tmp = Arc::new(0_u8);
            reg.monitor(&tmp, Policy::ReadOnly);
        }
        let keep = Arc::new(1_u8);
        reg.monitor(&keep, Policy::ReadOnly);
        // The fourth insert found three stale entries and cleared them first.
        assert_eq!(reg.sweep(), 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn live_heavy_table_defers_the_next_sweep() {
        let reg = Registry::with_config(RegistryConfig {
            report_violations: false,
            capture_backtraces: false,
            sweep_threshold: 4,
        });
        let live: Vec<Arc<u32>> = (0..20).map(Arc::new).collect();
        for obj in &live {
            reg.monitor(obj, Policy::ReadOnly);
        }
        // Sweeps ran at 5 and 11 entries, each finding everything alive.
        assert_eq!(reg.next_sweep_mark(), 22);

        // Below the mark, inserts never rescan, so stale entries linger.
        drop(live);
        let keep: Vec<Arc<u32>> = (0..2).map(Arc::new).collect();
        for obj in &keep {
            reg.monitor(obj, Policy::ReadOnly);
        }
        assert_eq!(reg.next_sweep_mark(), 22);
        assert_eq!(reg.len(), 2);

        // An explicit sweep clears them and lowers the mark again.
        assert_eq!(reg.sweep(), 20);
        assert_eq!(reg.next_sweep_mark(), 4);
    }

    #[test]
    fn global_registry_is_a_single_instance() {
        let a = Registry::global();
        let b = Registry::global();
        assert!(std::ptr::eq(a, b));
        let obj = Arc::new(0_u8);
        a.monitor(&obj, Policy::OwnerThreadOnly);
        assert_eq!(b.current_policy(&obj), Policy::OwnerThreadOnly);
        assert!(b.unmonitor(&obj));
    }

    #[test]
    fn unmonitor_forgets_the_record() {
        let reg = quiet();
        let obj = Arc::new(0_u8);
        reg.monitor(&obj, Policy::ReadOnly);
        assert!(reg.unmonitor(&obj));
        assert!(!reg.unmonitor(&obj));
        reg.modify(&obj);
    }

    #[test]
    fn generations_distinguish_records() {
        let reg = quiet();
        let a = Arc::new(0_u8);
        let b = Arc::new(0_u8);
        reg.monitor(&a, Policy::ReadOnly);
        reg.monitor(&b, Policy::ReadOnly);
        let ga = reg.snapshot(&a).unwrap().generation;
        let gb = reg.snapshot(&b).unwrap().generation;
        assert_ne!(ga, gb);
        reg.monitor(&a, Policy::Disabled);
        assert_eq!(reg.snapshot(&a).unwrap().generation, ga);
    }
}
