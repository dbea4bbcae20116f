// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for access-cop crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`sink`] - Recording violation sink fake
//! - [`race`] - Thread races released through a shared start gate
//! - [`panics`] - Violation extraction from panic payloads
//! - [`registry`] - Registries preconfigured for tests

pub mod panics;
pub mod race;
pub mod registry;
pub mod sink;

pub use panics::{catch_violation, violation_kind_of, violation_of};
pub use race::race;
pub use registry::{quiet_registry, recording_registry};
pub use sink::RecordingSink;
