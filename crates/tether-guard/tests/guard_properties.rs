//! Property tests: the protected and completed sets stay disjoint.

use proptest::prelude::*;
use tether_guard::InFlightGuard;

#[derive(Debug, Clone)]
enum Op {
    Protect(u8),
    Complete(u8),
    Unprotect(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8).prop_map(Op::Protect),
        (0u8..8).prop_map(Op::Complete),
        (0u8..8).prop_map(Op::Unprotect),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn sets_stay_disjoint(ops in prop::collection::vec(op(), 0..64)) {
        let guard = InFlightGuard::new();
        for op in &ops {
            match op {
                Op::Protect(id) => { guard.protect(&id.to_string()); }
                Op::Complete(id) => guard.complete(&id.to_string()),
                Op::Unprotect(id) => { guard.unprotect(&id.to_string()); }
            }
        }
        for id in 0u8..8 {
            let id = id.to_string();
            prop_assert!(!(guard.is_protected(&id) && guard.is_completed(&id)));
        }
    }
}

#[test]
fn concurrent_protect_and_complete() {
    let guard = std::sync::Arc::new(InFlightGuard::new());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let guard = std::sync::Arc::clone(&guard);
            std::thread::spawn(move || {
                for n in 0..100 {
                    let id = format!("{worker}-{n}");
                    guard.protect(&id);
                    guard.complete(&id);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(guard.protected_count(), 0);
    assert_eq!(guard.completed_count(), 800);
}
