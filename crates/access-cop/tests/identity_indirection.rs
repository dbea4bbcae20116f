// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Façades that share their backing object's access record.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::thread;

use access_cop::{AccessKind, Identity, MonitorTarget, Policy, ViolationKind};
use access_cop_dry_tests::quiet_registry;

struct Table {
    rows: Vec<u32>,
}

/// A cheap view handed out per caller, forwarding to the backing table.
struct TableView {
    table: Arc<Table>,
    start: usize,
}

impl MonitorTarget for TableView {
    fn monitor_identity(&self) -> Identity {
        self.table.monitor_identity()
    }
}

impl TableView {
    fn first(&self) -> Option<u32> {
        self.table.rows.get(self.start).copied()
    }
}

#[test]
fn facade_and_backing_share_one_record() {
    let reg = quiet_registry();
    let table = Arc::new(Table { rows: vec![1, 2, 3] });
    let a = TableView { table: Arc::clone(&table), start: 0 };
    let b = TableView { table: Arc::clone(&table), start: 2 };

    reg.monitor(&a, Policy::ReadOnly);
    assert_eq!(reg.current_policy(&table), Policy::ReadOnly);
    assert_eq!(reg.current_policy(&b), Policy::ReadOnly);
    assert_eq!(reg.len(), 1);

    let v = reg.try_access(&b, AccessKind::Modify).unwrap_err();
    assert_eq!(v.kind, ViolationKind::ReadOnly);
    assert_eq!(v.target, table.monitor_identity().addr());
    assert_eq!(b.first(), Some(3));
}

#[test]
fn bracket_through_one_view_excludes_another() {
    let reg = quiet_registry();
    let table = Arc::new(Table { rows: vec![7] });
    reg.monitor(&table, Policy::ExternallySynchronized);
    let mine = TableView { table: Arc::clone(&table), start: 0 };
    let theirs = TableView { table: Arc::clone(&table), start: 0 };

    let _held = reg.guard(&mine, AccessKind::Modify);
    let v = thread::scope(|s| s.spawn(|| reg.try_enter(&theirs, AccessKind::Read)).join().unwrap());
    assert_eq!(v.unwrap_err().kind, ViolationKind::ConcurrentAccess);
    assert_eq!(mine.first(), Some(7));
}

#[test]
fn stored_identity_outlives_views_but_not_the_object() {
    let reg = quiet_registry();
    let table = Arc::new(Table { rows: Vec::new() });
    let id = {
        let view = TableView { table: Arc::clone(&table), start: 0 };
        reg.monitor(&view, Policy::OwnerThreadOnly);
        view.monitor_identity()
    };
    assert_eq!(reg.current_policy(&id), Policy::OwnerThreadOnly);
    assert!(id.same_as(&Identity::of(&table)));

    drop(table);
    assert!(!id.is_alive());
    assert_eq!(reg.current_policy(&id), Policy::Disabled);
    assert!(reg.snapshot(&id).is_none());
    assert_eq!(reg.sweep(), 1);
}
