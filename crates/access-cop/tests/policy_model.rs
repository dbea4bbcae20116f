// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Single-thread model check of policy stacking and bracket depth.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use access_cop::{AccessKind, Policy, ViolationKind};
use access_cop_dry_tests::quiet_registry;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Monitor(Policy),
    Push(Policy),
    Pop,
    Enter,
    Leave,
    Read,
}

fn policy() -> impl Strategy<Value = Policy> {
    prop_oneof![
        Just(Policy::Disabled),
        Just(Policy::ReadOnly),
        Just(Policy::OwnerThreadOnly),
        Just(Policy::ExternallySynchronized),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        policy().prop_map(Op::Monitor),
        policy().prop_map(Op::Push),
        Just(Op::Pop),
        Just(Op::Enter),
        Just(Op::Leave),
        Just(Op::Read),
    ]
}

#[derive(Default)]
struct Model {
    policy: Policy,
    stack: Vec<Policy>,
    depth: u32,
    violations: u64,
}

proptest! {
    #[test]
    fn owner_thread_tracks_the_reference_model(ops in prop::collection::vec(op(), 0..64)) {
        let reg = quiet_registry();
        let obj = Arc::new(());
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Monitor(p) => {
                    reg.monitor(&obj, p);
                    model.policy = p;
                }
                Op::Push(p) => {
                    reg.push(&obj, p);
                    model.stack.push(model.policy);
                    model.policy = p;
                }
                Op::Pop => {
                    reg.pop(&obj);
                    if let Some(p) = model.stack.pop() {
                        model.policy = p;
                    }
                }
                Op::Enter => {
                    prop_assert!(reg.try_enter(&obj, AccessKind::Read).is_ok());
                    if model.policy.is_bracketed() {
                        model.depth += 1;
                    }
                }
                Op::Leave => {
                    let outcome = reg.try_leave(&obj);
                    if model.depth > 0 {
                        prop_assert!(outcome.is_ok());
                        model.depth -= 1;
                    } else if model.policy.is_bracketed() {
                        prop_assert_eq!(outcome.unwrap_err().kind, ViolationKind::NeverEntered);
                        model.violations += 1;
                    } else {
                        prop_assert!(outcome.is_ok());
                    }
                }
                Op::Read => prop_assert!(reg.try_access(&obj, AccessKind::Read).is_ok()),
            }

            prop_assert_eq!(reg.current_policy(&obj), model.policy);
            prop_assert_eq!(reg.violation_count(), model.violations);
            if let Some(snap) = reg.snapshot(&obj) {
                prop_assert_eq!(snap.depth, model.depth);
                prop_assert_eq!(snap.stacked, model.stack.len());
                prop_assert_eq!(snap.holder.is_some(), model.depth > 0);
            }
        }
    }
}
