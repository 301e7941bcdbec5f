//! Property-based tests for term conversion and the instance cache.
//!
//! These tests use proptest to verify invariants around:
//! - Primitive values surviving a host -> term -> host round trip
//! - Host instances keeping their identity through any number of tokens
//! - Tokens minted by independent query caches never colliding

use crate::class::{ClassBuilder, ClassRegistry};
use crate::host::Host;
use crate::value::{HostValue, Predicate, Variable};
use polar_host_types::Counter;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

// ============================================================================
// Strategies for generating arbitrary values
// ============================================================================

fn arb_name() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z_][a-z0-9_]{0,11}").unwrap()
}

/// Primitive leaves. Floats are finite: NaN never equals itself.
fn arb_leaf() -> impl Strategy<Value = HostValue> {
    prop_oneof![
        any::<bool>().prop_map(HostValue::Boolean),
        any::<i64>().prop_map(HostValue::Integer),
        (-1.0e12f64..1.0e12).prop_map(HostValue::Float),
        ".{0,16}".prop_map(HostValue::String),
        arb_name().prop_map(|n| HostValue::Variable(Variable::new(n))),
    ]
}

fn arb_value() -> impl Strategy<Value = HostValue> {
    arb_leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(HostValue::List),
            prop::collection::btree_map(arb_name(), inner.clone(), 0..6)
                .prop_map(HostValue::Dictionary),
            (arb_name(), prop::collection::vec(inner, 0..4))
                .prop_map(|(name, args)| HostValue::Predicate(Predicate::new(name, args))),
        ]
    })
}

#[derive(Debug)]
struct Widget(u32);

fn host() -> Host {
    let mut registry = ClassRegistry::new();
    registry
        .register(ClassBuilder::<Widget>::new().build())
        .unwrap();
    Host::new(Rc::new(RefCell::new(registry)), Counter::new())
}

proptest! {
    /// Anything without host instances converts back to an equal value.
    #[test]
    fn primitive_values_round_trip(value in arb_value()) {
        let mut host = host();
        let term = host.to_term(&value);
        let back = host.to_host(&term).unwrap();
        prop_assert_eq!(back, value);
    }

    /// Converting an instance many times yields distinct tokens that all
    /// resolve to the very same object.
    #[test]
    fn instances_keep_identity(seed in any::<u32>(), copies in 1usize..8) {
        let mut host = host();
        let value = HostValue::instance(Widget(seed));
        let mut ids = BTreeSet::new();
        for _ in 0..copies {
            let term = host.to_term(&value);
            ids.insert(term.instance_id().unwrap());
            let back = host.to_host(&term).unwrap();
            prop_assert!(back.as_instance().unwrap().same_object(value.as_instance().unwrap()));
            prop_assert_eq!(back.downcast_ref::<Widget>().map(|w| w.0), Some(seed));
        }
        prop_assert_eq!(ids.len(), copies);
    }

    /// Duplicated caches share one id sequence.
    #[test]
    fn duplicated_caches_never_share_tokens(plan in prop::collection::vec(0usize..3, 1..24)) {
        let base = host();
        let mut caches = vec![base.duplicate(), base.duplicate(), base.duplicate()];
        let mut seen: BTreeMap<u64, usize> = BTreeMap::new();
        for which in plan {
            let term = caches[which].to_term(&HostValue::instance(Widget(0)));
            let id = term.instance_id().unwrap();
            prop_assert!(seen.insert(id, which).is_none(), "token {} minted twice", id);
        }
        for (id, owner) in seen {
            for (which, cache) in caches.iter().enumerate() {
                prop_assert_eq!(cache.has_instance(id), which == owner);
            }
        }
    }
}
