// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! access-cop: runtime enforcement of threading contracts on shared objects.
//!
//! Each guarded object declares one [`Policy`]. Every guarded access is
//! checked against it and a named [`Violation`] is raised the instant the
//! contract is broken, instead of letting a data race surface later as
//! corruption.
//!
//! The registry only detects. It never takes locks on the caller's behalf.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use access_cop::{AccessKind, Policy, Registry, Violation, ViolationKind};
//!
//! let registry = Registry::new();
//! let shared = Arc::new(vec![1, 2, 3]);
//! registry.monitor(&shared, Policy::ExternallySynchronized);
//!
//! registry.with_access(&shared, AccessKind::Read, || {
//!     assert_eq!(shared.len(), 3);
//! });
//!
//! registry.monitor(&shared, Policy::ReadOnly);
//! let err: Violation = registry.try_access(&shared, AccessKind::Modify).unwrap_err();
//! assert_eq!(err.kind, ViolationKind::ReadOnly);
//! assert_eq!(registry.violation_count(), 1);
//! ```
//!
//! # Modules
//!
//! - [`Registry`]: identity table, policy management and access checks.
//! - [`MonitorTarget`]/[`Identity`]: weak identity keys and the indirection
//!   seam that lets façades share a backing object's record.
//! - [`Violation`]/[`Diagnostics`]: the error taxonomy, the global tally and
//!   pluggable [`ViolationSink`] reporting.
//! - [`FaultInjector`]: named pauses and one-shot forced failures for tests.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod config;
mod diagnostics;
mod fault;
mod guard;
mod identity;
mod policy;
mod record;
mod registry;
mod thread_token;
mod violation;

pub use config::{ConfigError, RegistryConfig};
pub use diagnostics::{Diagnostics, TracingSink, ViolationSink};
pub use fault::FaultInjector;
pub use guard::{AccessGuard, PolicyScope};
pub use identity::{Identity, MonitorTarget};
pub use policy::{AccessKind, Policy};
pub use registry::{RecordSnapshot, Registry};
pub use thread_token::ThreadToken;
pub use violation::{ForcedFailure, Violation, ViolationKind};
