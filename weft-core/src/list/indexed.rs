//! Index-keyed reconciliation.
//!
//! Identity is the position. Each instance owns a signal with the value at
//! its position, rewritten in place when that value changes; growing the
//! sequence creates instances at the tail and shrinking it disposes them.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::instance::{Failures, Instance};
use super::{ListHandle, ReconcileStats};
use crate::error::Result;
use crate::reactive::{Expr, Priority, Runtime, Signal, WeakRuntime};

type ItemFn<T, V> = Box<dyn Fn(Signal<T>, usize) -> V>;

struct IndexedList<T: 'static, V> {
    runtime: WeakRuntime,
    item: ItemFn<T, V>,
    instances: Vec<Instance<V, T>>,
}

impl<T, V> IndexedList<T, V>
where
    T: Clone + PartialEq + 'static,
    V: Clone + 'static,
{
    fn reconcile(&mut self, runtime: &Runtime, items: Vec<T>, failures: &mut Failures) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let wanted = items.len();

        for (index, value) in items.into_iter().enumerate() {
            if let Some(instance) = self.instances.get(index) {
                instance.signal().set(value);
                stats.reused += 1;
                continue;
            }

            // A failed creation ends the tail; later positions would shift.
            match Instance::create(runtime, runtime.signal(value), |value| (self.item)(value, index)) {
                Ok(instance) => {
                    self.instances.push(instance);
                    stats.created += 1;
                }
                Err(payload) => {
                    failures.record(payload);
                    break;
                }
            }
        }

        if self.instances.len() > wanted {
            for instance in self.instances.drain(wanted..) {
                if failures.guard(|| instance.dispose()) == Some(true) {
                    stats.disposed += 1;
                }
            }
        }

        stats
    }

    fn views(&self) -> Vec<V> {
        self.instances
            .iter()
            .map(|instance| instance.view().clone())
            .collect()
    }

    fn dispose_all(&mut self) -> usize {
        let mut failures = Failures::default();
        let mut disposed = 0;
        for instance in self.instances.drain(..) {
            if failures.guard(|| instance.dispose()) == Some(true) {
                disposed += 1;
            }
        }
        failures.resume();
        disposed
    }
}

impl Runtime {
    /// Reconcile `source` into one instance per position.
    ///
    /// `item` runs once per created instance, in the instance's own capturing
    /// scope, and receives a signal holding the value at its position. A
    /// changed value at a surviving position is written into that signal.
    ///
    /// Every instance is disposed with the enclosing scope.
    pub fn index_for<T, V, F>(&self, source: impl Into<Expr<Vec<T>>>, item: F) -> Result<ListHandle<V>>
    where
        T: Clone + PartialEq + 'static,
        V: Clone + 'static,
        F: Fn(Signal<T>, usize) -> V + 'static,
    {
        let source = source.into();
        let handle = ListHandle::new(self);
        let state = Rc::new(RefCell::new(IndexedList {
            runtime: self.downgrade(),
            item: Box::new(item),
            instances: Vec::new(),
        }));

        let owner = Rc::clone(&state);
        self.teardown(move || {
            let disposed = owner.borrow_mut().dispose_all();
            debug!(disposed, "indexed list disposed");
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
                let stats = list.reconcile(&runtime, items, &mut failures);
                let views = list.views();
                drop(list);

                debug!(
                    created = stats.created,
                    disposed = stats.disposed,
                    reused = stats.reused,
                    "indexed reconcile pass"
                );
                publish.publish(views, stats);
                failures.resume();
            },
            Priority::Trigger,
        )?;

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn labels(
        rt: &Runtime,
        source: &Signal<Vec<&'static str>>,
    ) -> (ListHandle<usize>, Rc<RefCell<Vec<Signal<&'static str>>>>, Rc<Cell<usize>>) {
        let values = Rc::new(RefCell::new(Vec::new()));
        let torn = Rc::new(Cell::new(0));

        let (rt2, store, counter) = (rt.clone(), values.clone(), torn.clone());
        let handle = rt
            .index_for(source.clone(), move |value, index| {
                store.borrow_mut().push(value);
                let counter = counter.clone();
                rt2.teardown(move || counter.set(counter.get() + 1)).unwrap();
                index
            })
            .unwrap();
        (handle, values, torn)
    }

    #[test]
    fn value_change_updates_in_place() {
        let rt = Runtime::new();
        let source = rt.signal(vec!["a", "b"]);
        let (list, values, torn) = labels(&rt, &source);

        source.set(vec!["a", "z"]);

        assert_eq!(values.borrow().len(), 2);
        assert_eq!(values.borrow()[1].get_untracked(), "z");
        assert_eq!(torn.get(), 0);
        assert_eq!(list.views(), vec![0, 1]);
        assert_eq!(list.stats().reused, 2);
    }

    #[test]
    fn growing_creates_tail_and_shrinking_disposes_it() {
        let rt = Runtime::new();
        let source = rt.signal(vec!["a"]);
        let (list, values, torn) = labels(&rt, &source);

        source.set(vec!["a", "b", "c"]);
        assert_eq!(values.borrow().len(), 3);
        assert_eq!(list.stats().created, 2);

        source.set(vec!["x"]);
        assert_eq!(torn.get(), 2);
        assert_eq!(list.views(), vec![0]);
        assert_eq!(values.borrow()[0].get_untracked(), "x");
        assert_eq!(list.totals().created, 3);
    }

    #[test]
    fn value_watchers_see_in_place_updates() {
        let rt = Runtime::new();
        let source = rt.signal(vec![1, 2]);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (rt2, log) = (rt.clone(), seen.clone());
        let _list = rt
            .index_for(source.clone(), move |value, index| {
                let log = log.clone();
                rt2.watch(move || value.get(), move |v| log.borrow_mut().push((index, v)))
                    .unwrap();
            })
            .unwrap();

        source.set(vec![1, 5]);
        assert_eq!(*seen.borrow(), vec![(0, 1), (1, 2), (1, 5)]);
    }

    #[test]
    fn empty_source_renders_only_the_anchor() {
        let rt = Runtime::new();
        let list = rt
            .index_for(Vec::<u8>::new(), |value, _| value.get_untracked())
            .unwrap();

        assert_eq!(list.nodes(), vec![crate::list::Node::Anchor]);
        assert_eq!(list.stats(), ReconcileStats::default());
    }

    #[test]
    fn disposing_scope_disposes_tail() {
        let rt = Runtime::new();
        let source = rt.signal(vec!["a", "b"]);

        let ((_, _, torn), disposer) = rt.capture_with(|| labels(&rt, &source));
        disposer.dispose();

        assert_eq!(torn.get(), 2);
        assert_eq!(rt.live_subscribers(), 0);
    }
}
