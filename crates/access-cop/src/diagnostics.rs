// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Violation counting, the last-violation slot, and pluggable reporting.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use crate::violation::{Violation, ViolationContext, ViolationKind};

/// Destination for violation reports.
///
/// The host application decides where reports go. Implementations must not
/// assume they run on any particular thread: reports are delivered
/// synchronously on the violating thread, before the violation is raised.
pub trait ViolationSink: Send + Sync {
    /// Receives one violation together with the call stack that produced it.
    ///
    /// `backtrace` is disabled unless backtrace capture is configured and
    /// enabled through `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`.
    fn report(&self, violation: &Violation, backtrace: &Backtrace);
}

/// Default sink: one `error`-level `tracing` event per violation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ViolationSink for TracingSink {
    fn report(&self, violation: &Violation, backtrace: &Backtrace) {
        if backtrace.status() == BacktraceStatus::Captured {
            error!(
                code = violation.kind.code(),
                serial = violation.serial,
                thread_name = violation.thread_name.as_deref().unwrap_or("<unnamed>"),
                %backtrace,
                "{violation}"
            );
        } else {
            error!(
                code = violation.kind.code(),
                serial = violation.serial,
                thread_name = violation.thread_name.as_deref().unwrap_or("<unnamed>"),
                "{violation}"
            );
        }
    }
}

thread_local! {
    // Set while this thread is inside a sink's `report`.
    static IN_REPORT: Cell<bool> = const { Cell::new(false) };
}

/// Clears the report flags on every exit path, including a panicking sink.
struct ReportScope<'a> {
    gate: Option<&'a AtomicBool>,
}

impl<'a> ReportScope<'a> {
    fn enter(kind: ViolationKind, wrong_thread_gate: &'a AtomicBool) -> Option<Self> {
        if IN_REPORT.with(Cell::get) {
            return None;
        }
        let gate = if kind == ViolationKind::WrongThread {
            if wrong_thread_gate
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return None;
            }
            Some(wrong_thread_gate)
        } else {
            None
        };
        IN_REPORT.with(|flag| flag.set(true));
        Some(Self { gate })
    }
}

impl Drop for ReportScope<'_> {
    fn drop(&mut self) {
        IN_REPORT.with(|flag| flag.set(false));
        if let Some(gate) = self.gate {
            gate.store(false, Ordering::Release);
        }
    }
}

/// Aggregate violation health for one registry.
///
/// Every violation the registry constructs passes through
/// [`raise`](Self::raise), which numbers it, stores it in the last-violation
/// slot and reports it, in that order. Supervising code can therefore assert
/// "zero violations" without handling each call site.
///
/// Reporting is storm-guarded: while one `WrongThread` report is in flight,
/// concurrently detected `WrongThread` violations skip the sink, and a sink
/// that trips a violation from inside `report` is not re-entered. Skipped
/// reports are still counted, recorded and raised.
pub struct Diagnostics {
    count: AtomicU64,
    last: Mutex<Option<Violation>>,
    sink: Arc<dyn ViolationSink>,
    report: bool,
    capture_backtraces: bool,
    wrong_thread_gate: AtomicBool,
}

impl Diagnostics {
    pub(crate) fn new(sink: Arc<dyn ViolationSink>, report: bool, capture_backtraces: bool) -> Self {
        Self {
            count: AtomicU64::new(0),
            last: Mutex::new(None),
            sink,
            report,
            capture_backtraces,
            wrong_thread_gate: AtomicBool::new(false),
        }
    }

    /// Number of violations constructed so far. Never decreases.
    pub fn violation_count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// The most recently constructed violation.
    pub fn last_violation(&self) -> Option<Violation> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Empties the last-violation slot. The counter is left untouched.
    pub fn clear_last_violation(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn raise(&self, context: ViolationContext) -> Violation {
        let serial = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        let violation = context.into_violation(serial);
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(violation.clone());
        if self.report {
            self.deliver(&violation);
        }
        violation
    }

    fn deliver(&self, violation: &Violation) {
        let Some(_scope) = ReportScope::enter(violation.kind, &self.wrong_thread_gate) else {
            return;
        };
        let backtrace = if self.capture_backtraces {
            Backtrace::capture()
        } else {
            Backtrace::disabled()
        };
        self.sink.report(violation, &backtrace);
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("violation_count", &self.violation_count())
            .field("report", &self.report)
            .field("capture_backtraces", &self.capture_backtraces)
            .finish_non_exhaustive()
    }
}
