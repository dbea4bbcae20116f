// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording violation sink fake.

use std::backtrace::Backtrace;
use std::sync::{Arc, Mutex};

use access_cop::{Violation, ViolationKind, ViolationSink};

type Hook = Arc<dyn Fn(&Violation) + Send + Sync>;

/// In-memory [`ViolationSink`] that keeps every report it receives.
///
/// Clones share storage, so a test can hand one clone to the registry and
/// inspect another.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use access_cop::{AccessKind, Policy, Registry, RegistryConfig};
/// use access_cop_dry_tests::RecordingSink;
///
/// let sink = RecordingSink::new();
/// let registry = Registry::with_sink(RegistryConfig::default(), Arc::new(sink.clone()));
/// let obj = Arc::new(0_u8);
/// registry.monitor(&obj, Policy::ReadOnly);
/// let _ = registry.try_access(&obj, AccessKind::Modify);
/// assert_eq!(sink.report_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<RecordingSinkInner>>,
}

#[derive(Default)]
struct RecordingSinkInner {
    reports: Vec<Violation>,
    hook: Option<Hook>,
}

impl RecordingSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` inside every `report` call, after the report is stored.
    ///
    /// Used to model sinks that touch guarded objects themselves.
    pub fn set_hook(&self, hook: impl Fn(&Violation) + Send + Sync + 'static) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.hook = Some(Arc::new(hook));
    }

    /// Number of reports received.
    pub fn report_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reports
            .len()
    }

    /// Every report received, in arrival order.
    pub fn reports(&self) -> Vec<Violation> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reports
            .clone()
    }

    /// Number of reports of `kind`.
    pub fn count_of(&self, kind: ViolationKind) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reports
            .iter()
            .filter(|v| v.kind == kind)
            .count()
    }

    /// Forget every report and the hook.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.reports.clear();
        inner.hook = None;
    }
}

impl ViolationSink for RecordingSink {
    fn report(&self, violation: &Violation, _backtrace: &Backtrace) {
        let hook = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.reports.push(violation.clone());
            inner.hook.clone()
        };
        // Lock released before the hook so it may inspect the sink.
        if let Some(hook) = hook {
            hook(violation);
        }
    }
}
