//! Reconciler instances and the panic bookkeeping shared by both variants.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::reactive::{Disposer, Runtime, Signal};

type Payload = Box<dyn Any + Send>;

/// The live state behind one reconciled item.
///
/// `S` is the type of the instance's own signal: its index for the
/// value-keyed variant, its value for the index-keyed one.
pub(crate) struct Instance<V, S: 'static> {
    view: V,
    signal: Signal<S>,
    scope: RefCell<Option<Disposer>>,
    /// Last pass that placed this instance.
    seen: Cell<u64>,
}

impl<V, S: 'static> Instance<V, S> {
    /// Run `build` in a fresh capturing scope.
    ///
    /// If `build` panics, whatever it registered before the panic is
    /// disposed and the payload is handed back.
    pub(crate) fn create(
        runtime: &Runtime,
        signal: Signal<S>,
        build: impl FnOnce(Signal<S>) -> V,
    ) -> Result<Self, Payload> {
        let handle = signal.clone();
        let (outcome, scope) =
            runtime.capture_with(|| panic::catch_unwind(AssertUnwindSafe(|| build(handle))));

        match outcome {
            Ok(view) => Ok(Self {
                view,
                signal,
                scope: RefCell::new(Some(scope)),
                seen: Cell::new(0),
            }),
            Err(payload) => {
                scope.dispose();
                Err(payload)
            }
        }
    }

    pub(crate) fn view(&self) -> &V {
        &self.view
    }

    pub(crate) fn signal(&self) -> &Signal<S> {
        &self.signal
    }

    pub(crate) fn stamp(&self, cycle: u64) {
        self.seen.set(cycle);
    }

    pub(crate) fn is_current(&self, cycle: u64) -> bool {
        self.seen.get() == cycle
    }

    /// Dispose the instance's scope. Returns `false` if it was already gone.
    pub(crate) fn dispose(&self) -> bool {
        let scope = self.scope.borrow_mut().take();
        match scope {
            Some(scope) => {
                scope.dispose();
                true
            }
            None => false,
        }
    }
}

/// Panics raised by item callbacks or teardowns during one pass.
///
/// The pass keeps going; the first panic is resumed once it is done.
#[derive(Default)]
pub(crate) struct Failures {
    first: Option<Payload>,
    count: usize,
}

impl Failures {
    pub(crate) fn record(&mut self, payload: Payload) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(payload);
        }
    }

    /// Run `f`, recording a panic instead of unwinding.
    pub(crate) fn guard<R>(&mut self, f: impl FnOnce() -> R) -> Option<R> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(payload) => {
                self.record(payload);
                None
            }
        }
    }

    /// Resume the first recorded panic, if any.
    pub(crate) fn resume(self) {
        if let Some(payload) = self.first {
            error!(count = self.count, "list item panicked during reconciliation");
            panic::resume_unwind(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn create_runs_in_its_own_scope() {
        let rt = Runtime::new();
        let torn = Rc::new(Cell::new(0));

        let counter = torn.clone();
        let instance = Instance::create(&rt, rt.signal(3), |index| {
            rt.teardown(move || counter.set(counter.get() + 1)).unwrap();
            index.get_untracked() * 2
        })
        .ok()
        .unwrap();

        assert_eq!(*instance.view(), 6);
        assert!(instance.dispose());
        assert!(!instance.dispose());
        assert_eq!(torn.get(), 1);
    }

    #[test]
    fn panicking_build_cleans_up_partial_work() {
        let rt = Runtime::new();
        let torn = Rc::new(Cell::new(false));

        let flag = torn.clone();
        let result = Instance::<(), usize>::create(&rt, rt.signal(0), |_| {
            rt.teardown(move || flag.set(true)).unwrap();
            panic!("item failed");
        });

        assert!(result.is_err());
        assert!(torn.get());
    }

    #[test]
    fn failures_resume_the_first_panic() {
        let mut failures = Failures::default();
        assert_eq!(failures.guard(|| 1), Some(1));
        assert_eq!(failures.guard(|| -> i32 { panic!("first") }), None);
        assert_eq!(failures.guard(|| -> i32 { panic!("second") }), None);

        let payload = panic::catch_unwind(AssertUnwindSafe(|| failures.resume())).unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"first"));
    }
}
