//! Property-based tests for list reconciliation
//!
//! Uses proptest to verify, over arbitrary sequences of transitions:
//! 1. The rendered views always equal the input sequence
//! 2. Live instances always equal the distinct keys
//! 3. Every created instance is disposed exactly once
//! 4. The positional variant keeps one instance per position

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use proptest::prelude::*;
use weft_core::reactive::{Runtime, Signal};

/// Lifecycle events per key, shared with the item callbacks.
#[derive(Default)]
struct Lifecycle {
    created: HashMap<u8, usize>,
    disposed: HashMap<u8, usize>,
}

impl Lifecycle {
    fn live(&self) -> HashSet<u8> {
        self.created
            .iter()
            .filter(|&(key, created)| *created > self.disposed.get(key).copied().unwrap_or(0))
            .map(|(key, _)| *key)
            .collect()
    }
}

fn sequences() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0u8..12, 0..16), 1..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn keyed_views_track_input(steps in sequences()) {
        let rt = Runtime::new();
        let source = rt.signal(Vec::new());
        let lifecycle = Rc::new(RefCell::new(Lifecycle::default()));

        let (list, disposer) = rt.capture_with(|| {
            let (rt2, lifecycle) = (rt.clone(), lifecycle.clone());
            rt.for_each(source.clone(), move |key: &u8, _| {
                let key = *key;
                *lifecycle.borrow_mut().created.entry(key).or_default() += 1;
                let lifecycle = lifecycle.clone();
                rt2.teardown(move || {
                    *lifecycle.borrow_mut().disposed.entry(key).or_default() += 1;
                })
                .unwrap();
                key
            })
            .unwrap()
        });

        for step in &steps {
            source.set(step.clone());

            prop_assert_eq!(&list.views(), step);
            let distinct: HashSet<u8> = step.iter().copied().collect();
            prop_assert_eq!(lifecycle.borrow().live(), distinct);
        }

        disposer.dispose();

        let lifecycle = lifecycle.borrow();
        for (key, created) in &lifecycle.created {
            prop_assert_eq!(lifecycle.disposed.get(key), Some(created));
        }
        prop_assert_eq!(rt.live_subscribers(), 0);
    }

    #[test]
    fn keyed_index_signals_point_at_first_occurrence(steps in sequences()) {
        let rt = Runtime::new();
        let source = rt.signal(Vec::new());
        let indices: Rc<RefCell<HashMap<u8, Signal<usize>>>> = Rc::default();

        let store = indices.clone();
        let _list = rt
            .for_each(source.clone(), move |key: &u8, index| {
                store.borrow_mut().insert(*key, index);
                *key
            })
            .unwrap();

        for step in &steps {
            source.set(step.clone());

            let indices = indices.borrow();
            for (position, key) in step.iter().enumerate() {
                let first = step.iter().position(|k| k == key).unwrap();
                if first == position {
                    prop_assert_eq!(indices[key].get_untracked(), position);
                }
            }
        }
    }

    #[test]
    fn indexed_keeps_one_instance_per_position(steps in sequences()) {
        let rt = Runtime::new();
        let source = rt.signal(Vec::new());
        let values: Rc<RefCell<HashMap<usize, Signal<u8>>>> = Rc::default();

        let store = values.clone();
        let list = rt
            .index_for(source.clone(), move |value: Signal<u8>, index| {
                store.borrow_mut().insert(index, value);
                index
            })
            .unwrap();

        let (mut previous, mut expected_created) = (0, 0);
        for step in &steps {
            source.set(step.clone());
            expected_created += step.len().saturating_sub(previous);
            previous = step.len();

            prop_assert_eq!(list.views(), (0..step.len()).collect::<Vec<_>>());
            let values = values.borrow();
            for (position, value) in step.iter().enumerate() {
                prop_assert_eq!(values[&position].get_untracked(), *value);
            }
        }

        prop_assert_eq!(list.totals().created, expected_created);
    }
}
