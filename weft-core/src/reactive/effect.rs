//! Watch and Effect Implementation
//!
//! A watch pairs a tracked expression with an untracked reaction. An effect
//! is a single body that is both tracked and capturing.
//!
//! # How a Watch Runs
//!
//! Each (re-)run is identified by the computation's cycle counter:
//!
//! 1. Dispose the previous reaction's scope.
//!
//! 2. Release last cycle's registrations, bump the cycle and evaluate the
//!    expression with a listener stamped with the new cycle. The expression
//!    runs in an inert scope.
//!
//! 3. If the expression panics, the computation is disposed and stays inert.
//!
//! 4. Run the reaction with tracking off, inside a fresh capturing scope.
//!
//! A notification whose stamp differs from the current cycle is stale: the
//! computation already re-ran through another path, so it is ignored.
//!
//! # Unfolding Re-entry
//!
//! A reaction that writes one of its own dependencies re-enters the
//! computation while it is still running. Instead of recursing, the re-entry
//! only marks the computation as queued and the outer run loops until nothing
//! is queued. However many times the dependency is written synchronously, that
//! collapses into one more pass.
//!
//! # Watch or Effect
//!
//! An effect is cheaper to write, but it reads dependencies and performs side
//! effects in one body. A side effect that runs before the last read may
//! observe state the rest of the body is about to depend on, and teardowns it
//! registers are bound to the same run as its reads. A watch finishes reading
//! before the reaction starts, so prefer it when the two must not interleave.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, error, trace};

use super::context::{ListenerFrame, ScopeSlot};
use super::scope::Disposer;
use super::subscriber::{Listener, Priority, Registrations};
use super::runtime::{Runtime, WeakRuntime};
use crate::error::{ReactiveError, Result};

enum Body<T> {
    /// Tracked expression feeding an untracked reaction.
    Split {
        expr: Box<dyn Fn() -> T>,
        reaction: Box<dyn Fn(T)>,
    },

    /// A single tracked and capturing body.
    Combined(Box<dyn Fn()>),
}

/// Shared machinery behind watches and effects.
pub(crate) struct Computation<T: 'static> {
    runtime: WeakRuntime,
    priority: Priority,
    body: Body<T>,

    /// Bumped on every run; registrations carry the value they were made in.
    cycle: Cell<u64>,
    disposed: Cell<bool>,
    running: Cell<bool>,
    queued: Cell<bool>,

    /// Entries registered during the current cycle.
    registrations: Registrations,

    /// Teardowns of the last reaction (or effect body).
    scope: RefCell<Option<Disposer>>,
}

impl<T: 'static> Computation<T> {
    fn new(runtime: &Runtime, priority: Priority, body: Body<T>) -> Self {
        Self {
            runtime: runtime.downgrade(),
            priority,
            body,
            cycle: Cell::new(0),
            disposed: Cell::new(false),
            running: Cell::new(false),
            queued: Cell::new(false),
            registrations: Rc::default(),
            scope: RefCell::new(None),
        }
    }

    fn listener(self: &Rc<Self>, cycle: u64) -> Listener {
        let this = Rc::clone(self);
        Listener::new(
            Rc::new(move |stamp| this.on_notify(stamp)),
            cycle,
            Rc::clone(&self.registrations),
        )
    }

    fn on_notify(self: &Rc<Self>, stamp: u64) {
        if self.disposed.get() {
            return;
        }
        if stamp != self.cycle.get() {
            trace!(stamp, cycle = self.cycle.get(), "ignore stale notification");
            return;
        }
        self.schedule();
    }

    /// Run now, or queue one more pass if already running.
    pub(crate) fn schedule(self: &Rc<Self>) {
        if self.running.get() {
            trace!(cycle = self.cycle.get(), "queue re-run");
            self.queued.set(true);
            return;
        }
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };

        self.running.set(true);
        let _running = RunningGuard {
            running: &self.running,
            queued: &self.queued,
        };

        let limit = runtime.config().max_unfold_passes;
        let mut passes = 0usize;
        loop {
            self.queued.set(false);
            self.run_once(&runtime);

            if !self.queued.get() || self.disposed.get() {
                break;
            }
            passes += 1;
            if passes > limit {
                error!(limit, "unfold limit exceeded");
                panic!("{}", ReactiveError::UnfoldLimitExceeded { limit });
            }
        }
    }

    fn run_once(self: &Rc<Self>, runtime: &Runtime) {
        let previous = self.scope.borrow_mut().take();
        if let Some(previous) = previous {
            previous.dispose();
        }
        if self.disposed.get() {
            return;
        }

        runtime.release(&self.registrations);
        let cycle = self.cycle.get() + 1;
        self.cycle.set(cycle);
        let frame = ListenerFrame::single(self.priority, self.listener(cycle));

        let poison = PoisonGuard {
            runtime,
            disposed: &self.disposed,
            registrations: &self.registrations,
            armed: true,
        };

        let disposer = match &self.body {
            Body::Split { expr, reaction } => {
                let value = runtime.evaluate(frame, ScopeSlot::Reject, || expr());
                poison.defuse();
                runtime.untrack(|| runtime.capture(|| reaction(value)))
            }
            Body::Combined(body) => {
                let disposer = {
                    let _frame = runtime.context().enter_frame(frame);
                    runtime.capture(|| body())
                };
                poison.defuse();
                disposer
            }
        };

        *self.scope.borrow_mut() = Some(disposer);
    }

    /// Stop reacting and run the last reaction's teardowns.
    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        debug!(cycle = self.cycle.get(), "dispose computation");

        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release(&self.registrations);
        }
        let scope = self.scope.borrow_mut().take();
        if let Some(scope) = scope {
            scope.dispose();
        }
    }

    #[cfg(test)]
    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// Clears the unfold flags when a run finishes or unwinds.
struct RunningGuard<'a> {
    running: &'a Cell<bool>,
    queued: &'a Cell<bool>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.set(false);
        self.queued.set(false);
    }
}

/// Leaves a computation inert if its tracked part unwinds.
struct PoisonGuard<'a> {
    runtime: &'a Runtime,
    disposed: &'a Cell<bool>,
    registrations: &'a Registrations,
    armed: bool,
}

impl PoisonGuard<'_> {
    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for PoisonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("tracked expression panicked; computation disposed");
            self.disposed.set(true);
            self.runtime.release(self.registrations);
        }
    }
}

impl Runtime {
    /// Re-run `reaction` with the value of `expr` whenever a dependency read
    /// by `expr` changes.
    ///
    /// Runs once immediately. The watch is disposed with the enclosing scope.
    pub fn watch<T, E, R>(&self, expr: E, reaction: R) -> Result<()>
    where
        T: 'static,
        E: Fn() -> T + 'static,
        R: Fn(T) + 'static,
    {
        self.watch_with(expr, reaction, Priority::Dependant)
    }

    /// Like [`Runtime::watch`], registering the expression's reads with the
    /// given priority.
    pub fn watch_with<T, E, R>(&self, expr: E, reaction: R, priority: Priority) -> Result<()>
    where
        T: 'static,
        E: Fn() -> T + 'static,
        R: Fn(T) + 'static,
    {
        let body = Body::Split {
            expr: Box::new(expr),
            reaction: Box::new(reaction),
        };
        self.start(Rc::new(Computation::new(self, priority, body)))
    }

    /// Re-run `body` whenever a dependency it reads changes.
    ///
    /// Teardowns registered by the body run before the next run.
    pub fn effect(&self, body: impl Fn() + 'static) -> Result<()> {
        let body = Body::Combined(Box::new(body));
        self.start(Rc::new(Computation::<()>::new(self, Priority::Dependant, body)))
    }

    fn start<T: 'static>(&self, computation: Rc<Computation<T>>) -> Result<()> {
        let owner = Rc::clone(&computation);
        self.teardown(move || owner.dispose())?;
        computation.schedule();
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
