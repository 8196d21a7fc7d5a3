//! Value-Keyed Reconciliation
//!
//! # How a Pass Works
//!
//! The new sequence is walked left to right with a cursor `i` into the
//! current positions. Each item is matched in this order:
//!
//! 1. The instance at `i` has the item's key: reuse it in place.
//!
//! 2. No instance has the key: create one and insert it at `i`.
//!
//! 3. The key's instance was already placed earlier in this pass (a
//!    duplicate key): render it again at `i`.
//!
//! 4. The key's instance sits further right, at `j`. If nothing between `i`
//!    and `j` is still wanted, those positions are spliced out and disposed.
//!    Otherwise the instance is moved to `i` in one step.
//!
//! Whatever the walk did not reach, or reached without placing, is disposed.
//! Every placed instance is stamped with the pass's cycle, so stale and
//! current instances are told apart without a second map.
//!
//! This is a greedy walk. It keeps small local edits cheap but does not
//! compute a minimal set of moves.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::mem;
use std::rc::Rc;

use tracing::debug;

use super::instance::{Failures, Instance};
use super::{ListHandle, ReconcileStats};
use crate::error::Result;
use crate::reactive::{Expr, Priority, Runtime, Signal, WeakRuntime};

type ItemFn<T, V> = Box<dyn Fn(&T, Signal<usize>) -> V>;

struct Position<T, V> {
    key: T,
    instance: Rc<Instance<V, usize>>,
}

struct KeyedList<T, V> {
    runtime: WeakRuntime,
    item: ItemFn<T, V>,
    positions: Vec<Position<T, V>>,
    by_key: HashMap<T, Rc<Instance<V, usize>>>,
    cycle: u64,
}

impl<T, V> KeyedList<T, V>
where
    T: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    fn reconcile(&mut self, runtime: &Runtime, items: &[T], failures: &mut Failures) -> ReconcileStats {
        self.cycle += 1;
        let cycle = self.cycle;
        let mut stats = ReconcileStats::default();
        let wanted: HashSet<&T> = items.iter().collect();

        let mut i = 0;
        for item in items {
            if let Some(position) = self.positions.get(i) {
                if position.key == *item {
                    if position.instance.is_current(cycle) {
                        stats.duplicates += 1;
                    } else {
                        position.instance.stamp(cycle);
                        stats.reused += 1;
                    }
                    i += 1;
                    continue;
                }
            }

            let Some(instance) = self.by_key.get(item).cloned() else {
                let index = runtime.signal(i);
                match Instance::create(runtime, index, |index| (self.item)(item, index)) {
                    Ok(instance) => {
                        let instance = Rc::new(instance);
                        instance.stamp(cycle);
                        self.by_key.insert(item.clone(), Rc::clone(&instance));
                        self.positions.insert(i, Position { key: item.clone(), instance });
                        stats.created += 1;
                        i += 1;
                    }
                    Err(payload) => failures.record(payload),
                }
                continue;
            };

            if instance.is_current(cycle) {
                self.positions.insert(i, Position { key: item.clone(), instance });
                stats.duplicates += 1;
                i += 1;
                continue;
            }

            instance.stamp(cycle);
            stats.reused += 1;

            let found = self.positions[i..]
                .iter()
                .position(|p| Rc::ptr_eq(&p.instance, &instance))
                .map(|offset| i + offset);
            let Some(j) = found else {
                self.positions.insert(i, Position { key: item.clone(), instance });
                stats.moved += 1;
                i += 1;
                continue;
            };

            let jumped_over_wanted = self.positions[i..j]
                .iter()
                .any(|p| !p.instance.is_current(cycle) && wanted.contains(&p.key));

            if jumped_over_wanted {
                let position = self.positions.remove(j);
                self.positions.insert(i, position);
                stats.moved += 1;
            } else {
                let skipped: Vec<_> = self.positions.drain(i..j).collect();
                stats.disposed += self.dispose_stale(skipped, cycle, failures);
            }
            i += 1;
        }

        let tail: Vec<_> = self.positions.drain(i..).collect();
        stats.disposed += self.dispose_stale(tail, cycle, failures);

        // Index signals follow the first position an instance renders at.
        let mut placed = HashSet::new();
        for (index, position) in self.positions.iter().enumerate() {
            if placed.insert(Rc::as_ptr(&position.instance)) {
                position.instance.signal().set(index);
            }
        }

        stats
    }

    /// Dispose every instance among `removed` that this pass did not place.
    fn dispose_stale(&mut self, removed: Vec<Position<T, V>>, cycle: u64, failures: &mut Failures) -> usize {
        let mut disposed = 0;
        for position in removed {
            if position.instance.is_current(cycle) {
                continue;
            }
            self.by_key.remove(&position.key);
            if failures.guard(|| position.instance.dispose()) == Some(true) {
                disposed += 1;
            }
        }
        disposed
    }

    fn views(&self) -> Vec<V> {
        self.positions
            .iter()
            .map(|position| position.instance.view().clone())
            .collect()
    }

    /// Dispose every instance, last rendered first. A repeated key is
    /// disposed at its last position only.
    fn dispose_all(&mut self) -> usize {
        let mut failures = Failures::default();
        let mut disposed = 0;
        let positions = mem::take(&mut self.positions);
        let instances = positions
            .iter()
            .rev()
            .map(|position| &position.instance)
            .chain(self.by_key.values());
        for instance in instances {
            if failures.guard(|| instance.dispose()) == Some(true) {
                disposed += 1;
            }
        }
        self.by_key.clear();
        failures.resume();
        disposed
    }
}

impl Runtime {
    /// Reconcile `source` into one instance per distinct item.
    ///
    /// `item` runs once per created instance, in the instance's own capturing
    /// scope, and receives a signal holding the instance's current position.
    /// Repeated items render the first occurrence's instance again.
    ///
    /// Every instance is disposed with the enclosing scope.
    pub fn for_each<T, V, F>(&self, source: impl Into<Expr<Vec<T>>>, item: F) -> Result<ListHandle<V>>
    where
        T: Eq + Hash + Clone + 'static,
        V: Clone + 'static,
        F: Fn(&T, Signal<usize>) -> V + 'static,
    {
        let source = source.into();
        let handle = ListHandle::new(self);
        let state = Rc::new(RefCell::new(KeyedList {
            runtime: self.downgrade(),
            item: Box::new(item),
            positions: Vec::new(),
            by_key: HashMap::new(),
            cycle: 0,
        }));

        let owner = Rc::clone(&state);
        self.teardown(move || {
            let disposed = owner.borrow_mut().dispose_all();
            debug!(disposed, "keyed list disposed");
        })?;

        let publish = handle.clone();
        self.watch_with(
            move || source.get(),
            move |items: Vec<T>| {
                let mut list = state.borrow_mut();
                let Some(runtime) = list.runtime.upgrade() else {
                    return;
                };

                let mut failures = Failures::default();
                let stats = list.reconcile(&runtime, &items, &mut failures);
                let views = list.views();
                drop(list);

                debug!(
                    created = stats.created,
                    disposed = stats.disposed,
                    moved = stats.moved,
                    "keyed reconcile pass"
                );
                publish.publish(views, stats);
                failures.resume();
            },
            Priority::Trigger,
        )?;

        Ok(handle)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
