// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Two threads racing into one externally-synchronized object.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use access_cop::{AccessKind, Policy, Registry, ViolationKind};
use access_cop_dry_tests::{quiet_registry, race, recording_registry, violation_kind_of};

const HOLD: &str = "race.hold";

fn enter_hold_leave(reg: &Registry, obj: &Arc<Vec<u8>>) {
    reg.enter(obj, AccessKind::Modify);
    reg.faults().pause(HOLD);
    reg.leave(obj);
}

#[test]
fn exactly_one_racer_observes_concurrent_access() {
    let reg = Arc::new(quiet_registry());
    let obj = Arc::new(vec![0_u8; 16]);
    reg.monitor(&obj, Policy::ExternallySynchronized);
    reg.faults().add_pause(HOLD, Duration::from_millis(100));
    let before = reg.violation_count();

    let outcomes = {
        let reg = Arc::clone(&reg);
        let obj = Arc::clone(&obj);
        race(2, move |_| enter_hold_leave(&reg, &obj))
    };

    let failures: Vec<_> = outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .map(|payload| violation_kind_of(payload.as_ref()))
        .collect();
    assert_eq!(failures, vec![Some(ViolationKind::ConcurrentAccess)]);
    assert_eq!(reg.violation_count(), before + 1);

    // The winner released; the object is free again.
    let snap = reg.snapshot(&obj).unwrap();
    assert_eq!(snap.holder, None);
    assert_eq!(snap.depth, 0);
}

#[test]
fn losers_are_reported_with_their_thread_names() {
    let (reg, sink) = recording_registry();
    let reg = Arc::new(reg);
    let obj = Arc::new(vec![0_u8; 4]);
    reg.monitor(&obj, Policy::ExternallySynchronized);
    reg.faults().add_pause(HOLD, Duration::from_millis(100));

    let outcomes = {
        let reg = Arc::clone(&reg);
        let obj = Arc::clone(&obj);
        race(4, move |_| enter_hold_leave(&reg, &obj))
    };

    let losers = outcomes.iter().filter(|o| o.is_err()).count();
    assert_eq!(losers, 3);
    assert_eq!(sink.count_of(ViolationKind::ConcurrentAccess), 3);
    for report in sink.reports() {
        let name = report.thread_name.unwrap_or_default();
        assert!(name.starts_with("race-"), "{name}");
        assert_eq!(report.access, Some(AccessKind::Modify));
    }
}

#[test]
fn serialized_accesses_never_raise() {
    let reg = Arc::new(quiet_registry());
    let obj = Arc::new(vec![0_u8; 4]);
    reg.monitor(&obj, Policy::ExternallySynchronized);
    for _ in 0..8 {
        let reg = Arc::clone(&reg);
        let obj = Arc::clone(&obj);
        std::thread::spawn(move || {
            reg.with_access(&obj, AccessKind::Modify, || {});
        })
        .join()
        .unwrap();
    }
    assert_eq!(reg.violation_count(), 0);
}
