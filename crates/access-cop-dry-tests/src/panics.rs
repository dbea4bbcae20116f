// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Violation extraction from panic payloads.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use access_cop::{Violation, ViolationKind};

/// The [`Violation`] carried by a panic payload, if it carries one.
pub fn violation_of(payload: &(dyn Any + Send)) -> Option<&Violation> {
    payload.downcast_ref::<Violation>()
}

/// The [`ViolationKind`] carried by a panic payload, if any.
pub fn violation_kind_of(payload: &(dyn Any + Send)) -> Option<ViolationKind> {
    violation_of(payload).map(|v| v.kind)
}

/// Runs `f` and returns the violation it panicked with.
///
/// Returns `None` when `f` completes. A panic with any other payload is
/// resumed so unrelated failures are not masked.
pub fn catch_violation<R>(f: impl FnOnce() -> R) -> Option<Violation> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => None,
        Err(payload) => match payload.downcast::<Violation>() {
            Ok(violation) => Some(*violation),
            Err(other) => std::panic::resume_unwind(other),
        },
    }
}
