// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Containers that check every operation against an access contract.
//!
//! Each container keeps its storage behind an `Arc` and registers that
//! allocation with a [`Registry`](access_cop::Registry). Operations open a
//! bracketed access before touching storage, so the contract is checked
//! before any lock is taken: a thread that overlaps an externally
//! synchronized container fails fast with the violation instead of waiting.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

mod map;
mod vec;

pub use map::GuardedMap;
pub use vec::{GuardedIter, GuardedVec, VecView};
