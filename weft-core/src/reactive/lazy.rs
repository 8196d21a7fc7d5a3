//! Lazy Derived Values
//!
//! A lazy is a memo that defers work. Its expression is tracked through a
//! single proxy listener with trigger priority. When a dependency changes the
//! proxy only marks the value dirty, bumps the cycle and tells the lazy's own
//! readers; the expression runs again on the next read.
//!
//! Like every other notification, the proxy is deferred inside a batch, so a
//! read made inside the batch that caused the change still sees the old value.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use tracing::trace;

use super::context::{ListenerFrame, ScopeSlot};
use super::runtime::{Runtime, WeakRuntime};
use super::signal::Signal;
use super::subscriber::{Listener, Priority, Registrations};
use crate::error::Result;

struct LazyState<T> {
    runtime: WeakRuntime,
    expr: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    disposed: Cell<bool>,
    cycle: Cell<u64>,
    registrations: Registrations,
    /// Carries the lazy's own readers; notified on invalidation.
    version: Signal<()>,
}

impl<T: 'static> LazyState<T> {
    fn invalidate(&self, stamp: u64) {
        if self.disposed.get() || stamp != self.cycle.get() {
            return;
        }
        trace!(cycle = stamp, "invalidate lazy value");

        self.cycle.set(stamp + 1);
        self.dirty.set(true);
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release(&self.registrations);
        }
        self.version.notify();
    }

    fn refresh(self: &Rc<Self>) {
        let Some(runtime) = self.runtime.upgrade() else {
            *self.value.borrow_mut() = Some((self.expr)());
            self.dirty.set(false);
            return;
        };

        runtime.release(&self.registrations);
        let cycle = self.cycle.get() + 1;
        self.cycle.set(cycle);

        let frame = if self.disposed.get() {
            ListenerFrame::untracked()
        } else {
            let this = Rc::clone(self);
            let listener = Listener::new(
                Rc::new(move |stamp| this.invalidate(stamp)),
                cycle,
                Rc::clone(&self.registrations),
            );
            ListenerFrame::single(Priority::Trigger, listener)
        };

        let value = runtime.evaluate(frame, ScopeSlot::Reject, || (self.expr)());
        *self.value.borrow_mut() = Some(value);
        self.dirty.set(false);
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release(&self.registrations);
        }
    }
}

/// A derived value computed on first read after each invalidation.
///
/// A read that finds the value dirty re-evaluates it; a panic in the
/// expression propagates to that reader and the value stays dirty.
pub struct Lazy<T: 'static> {
    state: Rc<LazyState<T>>,
}

impl<T: 'static> Lazy<T> {
    /// Get the value, computing it if dirty, and register the current listeners.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the value, computing it if dirty, and register the current listeners.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.state.version.track();
        self.with_untracked(f)
    }

    /// Borrow the value, computing it if dirty, without tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let stale = self.state.dirty.get() || self.state.value.borrow().is_none();
        if stale {
            self.state.refresh();
        }
        let value = self.state.value.borrow();
        f(value.as_ref().expect("lazy value is computed before it is read"))
    }

    /// Whether the next read will re-evaluate the expression.
    pub fn is_dirty(&self) -> bool {
        self.state.dirty.get()
    }
}

impl<T: 'static> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Debug + 'static> Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("value", &*self.state.value.borrow())
            .field("dirty", &self.state.dirty.get())
            .finish()
    }
}

impl Runtime {
    /// Create a lazy derived value over `expr`.
    ///
    /// Nothing is evaluated until the first read. The lazy stops tracking when
    /// the enclosing scope is disposed.
    pub fn lazy<T, F>(&self, expr: F) -> Result<Lazy<T>>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        let state = Rc::new(LazyState {
            runtime: self.downgrade(),
            expr: Box::new(expr),
            value: RefCell::new(None),
            dirty: Cell::new(true),
            disposed: Cell::new(false),
            cycle: Cell::new(0),
            registrations: Rc::default(),
            version: self.signal_always(()),
        });

        let owner = Rc::clone(&state);
        self.teardown(move || owner.dispose())?;

        Ok(Lazy { state })
    }
}
