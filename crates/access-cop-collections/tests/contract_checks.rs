// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Guarded collections under contract breaches from other threads.
#![allow(clippy::unwrap_used)]

use std::sync::mpsc;
use std::thread;

use access_cop::{Policy, ViolationKind};
use access_cop_collections::{GuardedMap, GuardedVec};
use access_cop_dry_tests::{catch_violation, quiet_registry};

#[test]
fn owner_only_vec_rejects_foreign_push() {
    let reg = quiet_registry();
    let v = GuardedVec::new(&reg, Policy::OwnerThreadOnly);
    v.push(1_u32);
    let caught = thread::scope(|s| s.spawn(|| catch_violation(|| v.push(2))).join().unwrap());
    assert_eq!(caught.unwrap().kind, ViolationKind::WrongThread);
    assert_eq!(v.len(), 1);
}

#[test]
fn read_only_vec_rejects_every_mutation() {
    let reg = quiet_registry();
    let v = GuardedVec::from_vec(&reg, Policy::ReadOnly, vec![1_u8, 2]);
    let mutations: [&dyn Fn(); 4] = [
        &|| v.push(3),
        &|| drop(v.pop()),
        &|| drop(v.set(0, 9)),
        &|| v.clear(),
    ];
    for mutate in mutations {
        assert_eq!(catch_violation(mutate).unwrap().kind, ViolationKind::ReadOnly);
    }
    assert_eq!(v.iter().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(reg.violation_count(), 4);
}

#[test]
fn iteration_detects_a_concurrent_bracketed_write() {
    let reg = quiet_registry();
    let v = GuardedVec::from_vec(&reg, Policy::ExternallySynchronized, vec![1, 2, 3, 4]);
    let mut it = v.iter();
    assert_eq!(it.next(), Some(1));

    let (writing_tx, writing_rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let v_ref = &v;
    thread::scope(|s| {
        let writer = s.spawn(move || {
            v_ref.with_mut(|items| {
                items.push(5);
                writing_tx.send(()).unwrap();
                done_rx.recv().unwrap();
            });
        });
        writing_rx.recv().unwrap();
        let caught = catch_violation(|| it.next());
        assert_eq!(caught.unwrap().kind, ViolationKind::ConcurrentAccess);
        done_tx.send(()).unwrap();
        writer.join().unwrap();
    });

    // The cursor did not advance past the failed fetch.
    assert_eq!(it.collect::<Vec<_>>(), vec![2, 3, 4, 5]);
}

#[test]
fn view_bracket_excludes_writers_on_other_threads() {
    let reg = quiet_registry();
    let v = GuardedVec::from_vec(&reg, Policy::ExternallySynchronized, vec![0_u64]);
    let view = v.view();
    let _held = reg.guard(&view, access_cop::AccessKind::Read);
    let caught = thread::scope(|s| s.spawn(|| catch_violation(|| v.push(1))).join().unwrap());
    assert_eq!(caught.unwrap().kind, ViolationKind::ConcurrentAccess);
}

#[test]
fn map_follows_the_same_contract() {
    let reg = quiet_registry();
    let map = GuardedMap::new(&reg, Policy::OwnerThreadOnly);
    assert_eq!(map.insert(1_u32, "one"), None);
    assert_eq!(map.insert(1, "uno"), Some("one"));
    let caught = thread::scope(|s| s.spawn(|| catch_violation(|| map.get(&1))).join().unwrap());
    assert_eq!(caught.unwrap().kind, ViolationKind::WrongThread);
    assert_eq!(map.remove(&1), Some("uno"));
    assert!(map.is_empty());
}
