//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, watches,
//! memos and the reconciler. It owns the context stack, the subscriber arena
//! and the pending-notification queue of the active batch.
//!
//! # How It Works
//!
//! 1. When a signal is read inside a tracked region, the runtime inserts one
//!    subscriber entry per installed listener and hands the IDs to the signal.
//!
//! 2. When a signal changes, it gives its registrations to the runtime and
//!    forgets them. Registrations are one-shot: a computation that re-runs
//!    registers again.
//!
//! 3. Inside an explicit batch, notifications are queued until the outermost
//!    batch exits. Otherwise they are drained before the write returns:
//!    a. trigger-class entries run first, with writes they make queued
//!       behind them until no trigger-class entry is left
//!    b. dependant-class entries then run in the order they were queued
//!    c. a write made by a dependant is drained the same way, synchronously
//!
//! Draining in this order is what keeps a diamond glitch-free: every memo on
//! the way to a watcher is refreshed before the watcher runs, and the stale
//! duplicate registrations it leaves behind are skipped by ID or by cycle.
//!
//! # Thread Safety
//!
//! None. A runtime and everything created from it belong to one thread.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{error, trace};

use super::context::{ContextStack, ListenerFrame, ScopeSlot};
use super::subscriber::{Priority, Registrations, Subscriber, SubscriberArena, SubscriberId, Subscriptions};
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};

/// Notifications waiting for the outermost batch to drain.
#[derive(Default)]
struct Pending {
    triggers: VecDeque<SubscriberId>,
    dependants: VecDeque<SubscriberId>,
}

impl Pending {
    fn clear(&mut self) {
        self.triggers.clear();
        self.dependants.clear();
    }
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    context: ContextStack,
    subscribers: RefCell<SubscriberArena>,
    pending: RefCell<Pending>,
    batch_depth: Cell<usize>,
}

/// Owning handle to a reactive runtime.
///
/// Cloning the handle is cheap and shares the runtime. Signals and
/// computations keep only a weak reference, so dropping the last handle
/// tears the dependency graph down with it.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(1);
///
/// let doubled = {
///     let count = count.clone();
///     rt.memo(move || count.get() * 2).unwrap()
/// };
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Weak counterpart of [`Runtime`], held by every primitive.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::from_valid_config(RuntimeConfig::default())
    }

    /// Create a runtime with a custom configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                context: ContextStack::default(),
                subscribers: RefCell::new(SubscriberArena::default()),
                pending: RefCell::new(Pending::default()),
                batch_depth: Cell::new(0),
            }),
        }
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether reads in the current context register dependencies.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_tracking()
    }

    /// Whether notifications are currently being deferred.
    pub fn is_batching(&self) -> bool {
        self.inner.batch_depth.get() > 0
    }

    /// Number of live subscriber entries across all signals.
    pub fn live_subscribers(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Run `f` with notifications deferred until the outermost batch exits.
    ///
    /// Nested batches collapse into the outermost one. Panics if draining
    /// exceeds [`RuntimeConfig::max_drain_steps`]; see [`Runtime::try_batch`].
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.try_batch(f) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`Runtime::batch`], but reports a runaway drain as an error.
    pub fn try_batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let depth = self.inner.batch_depth.get();
        self.inner.batch_depth.set(depth + 1);

        let guard = BatchGuard {
            inner: &self.inner,
            armed: true,
        };
        let value = f();

        if guard.close() {
            self.flush()?;
        }
        Ok(value)
    }

    /// Run `f` with dependency tracking switched off.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _frame = self.inner.context.enter_frame(ListenerFrame::untracked());
        f()
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }

    pub(crate) fn context(&self) -> &ContextStack {
        &self.inner.context
    }

    /// Run `f` inside a listener frame and scope slot.
    pub(crate) fn evaluate<R>(&self, frame: ListenerFrame, slot: ScopeSlot, f: impl FnOnce() -> R) -> R {
        let _frame = self.inner.context.enter_frame(frame);
        let _scope = self.inner.context.enter_scope(slot);
        f()
    }

    /// Register every listener of the current frame against `subs`.
    pub(crate) fn track(&self, subs: &RefCell<Subscriptions>) {
        self.inner.context.with_tracking(|frame| {
            let mut arena = self.inner.subscribers.borrow_mut();
            let mut subs = subs.borrow_mut();

            for listener in frame.triggers() {
                let id = arena.insert(listener.entry());
                listener.record(id);
                subs.push(Priority::Trigger, id, &arena);
            }
            if let Some(listener) = frame.dependant() {
                let id = arena.insert(listener.entry());
                listener.record(id);
                subs.push(Priority::Dependant, id, &arena);
            }
        });
    }

    /// Free every entry a computation registered.
    pub(crate) fn release(&self, owned: &Registrations) {
        let ids = mem::take(&mut *owned.borrow_mut());
        if ids.is_empty() {
            return;
        }

        // Dropping an entry may drop the last handle to its computation, so
        // the arena borrow ends before the entries go.
        let removed: SmallVec<[Subscriber; 4]> = {
            let mut arena = self.inner.subscribers.borrow_mut();
            ids.into_iter().filter_map(|id| arena.remove(id)).collect()
        };
        drop(removed);
    }

    pub(crate) fn live_count(&self, subs: &Subscriptions) -> usize {
        subs.live_count(&self.inner.subscribers.borrow())
    }

    /// Queue a signal's registrations, draining immediately unless a batch is open.
    pub(crate) fn schedule(&self, subs: Subscriptions) {
        if subs.is_empty() {
            return;
        }

        {
            let mut pending = self.inner.pending.borrow_mut();
            pending.triggers.extend(subs.triggers);
            pending.dependants.extend(subs.dependants);
        }

        if self.inner.batch_depth.get() == 0 {
            if let Err(err) = self.flush() {
                panic!("{err}");
            }
        }
    }

    /// Drain pending notifications.
    ///
    /// Trigger-class entries run first with the batch held open, so derived
    /// values settle before anything observes them and the writes they make
    /// are queued behind them. Dependants then run with no batch open; a
    /// write made by a reaction is serviced before that write returns, and a
    /// computation re-entering itself is unfolded by its own run loop.
    fn flush(&self) -> Result<()> {
        let dependants = {
            self.inner.batch_depth.set(1);
            let _drain = DrainGuard { inner: &self.inner };

            let limit = self.inner.config.max_drain_steps;
            let mut steps = 0usize;
            loop {
                let next = self.inner.pending.borrow_mut().triggers.pop_front();
                let Some(id) = next else {
                    break;
                };

                steps += 1;
                if steps > limit {
                    error!(limit, "notification drain limit exceeded");
                    return Err(ReactiveError::DrainLimitExceeded { limit });
                }
                self.notify_entry(id);
            }

            // Bound to a local so the `RefMut` is released before `_drain` drops.
            #[allow(clippy::let_and_return)]
            let dependants = mem::take(&mut self.inner.pending.borrow_mut().dependants);
            dependants
        };

        for id in dependants {
            self.notify_entry(id);
        }
        Ok(())
    }

    fn notify_entry(&self, id: SubscriberId) {
        let entry = self.inner.subscribers.borrow().get(id).cloned();
        match entry {
            Some(entry) => {
                trace!(index = id.index(), cycle = entry.cycle(), "notify subscriber");
                entry.notify();
            }
            None => trace!(index = id.index(), "skip released subscriber"),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("batch_depth", &self.inner.batch_depth.get())
            .field("live_subscribers", &self.live_subscribers())
            .field("scope_depth", &self.inner.context.scope_depth())
            .finish()
    }
}

/// Closes a batch level. On unwind, the outermost level discards whatever
/// was queued.
struct BatchGuard<'a> {
    inner: &'a RuntimeInner,
    armed: bool,
}

impl BatchGuard<'_> {
    /// Returns `true` when this was the outermost batch.
    fn close(mut self) -> bool {
        self.armed = false;
        let depth = self.inner.batch_depth.get().saturating_sub(1);
        self.inner.batch_depth.set(depth);
        depth == 0
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let depth = self.inner.batch_depth.get().saturating_sub(1);
            self.inner.batch_depth.set(depth);
            if depth == 0 {
                self.inner.pending.borrow_mut().clear();
            }
        }
    }
}

/// Closes the batch held open by the trigger phase of a drain. Leftovers are
/// discarded on unwind or when the drain limit trips; otherwise only the
/// dependants remain and they are taken before the guard drops.
struct DrainGuard<'a> {
    inner: &'a RuntimeInner,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.inner.pending.borrow_mut().clear();
        self.inner.batch_depth.set(0);
    }
}
