//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracked region (watch expression, memo,
//!    effect), the runtime registers the region's listeners with the signal.
//!
//! 2. When a signal's value changes, its registrations are handed to the
//!    runtime and forgotten; trigger-class entries run before dependant-class
//!    entries.
//!
//! 3. Writes are gated by the signal's equality policy. A write that compares
//!    equal never notifies.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value and equality policy, shared behind an `Rc`
//! - Two lists of subscriber IDs (triggers and dependants)
//! - A weak handle to its runtime

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::Subscriptions;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Equality used by [`Runtime::signal`]: `==`, except that two values which
/// are both unequal to themselves (NaN) also count as equal.
pub fn same_value<T: PartialEq>(a: &T, b: &T) -> bool {
    #[allow(clippy::eq_op)]
    let both_unordered = a != a && b != b;
    a == b || both_unordered
}

/// What an [`Signal::update`] closure reports back.
///
/// Returning `()` always notifies; returning a `bool` notifies only when it
/// is `true`, which lets a caller make several in-place edits and announce
/// them once.
pub trait UpdateOutcome {
    /// Whether subscribers should be notified.
    fn changed(self) -> bool;
}

impl UpdateOutcome for () {
    fn changed(self) -> bool {
        true
    }
}

impl UpdateOutcome for bool {
    fn changed(self) -> bool {
        self
    }
}

type Equals<T> = Box<dyn Fn(&T, &T) -> bool>;

struct SignalState<T> {
    value: RefCell<T>,
    /// `None` means every write notifies.
    equals: Option<Equals<T>>,
    subscriptions: RefCell<Subscriptions>,
}

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// count.set(5);
/// count.update(|v| *v += 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T: 'static> {
    /// Unique identifier for this signal.
    id: u64,

    state: Rc<SignalState<T>>,

    runtime: WeakRuntime,
}

impl<T: 'static> Signal<T> {
    /// Create a signal whose writes are gated by [`same_value`].
    pub fn new(runtime: &Runtime, value: T) -> Self
    where
        T: PartialEq,
    {
        Self::build(runtime, value, Some(Box::new(same_value::<T>)))
    }

    /// Create a signal with a custom equality policy.
    pub fn with_equals<F>(runtime: &Runtime, value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        Self::build(runtime, value, Some(Box::new(equals)))
    }

    /// Create a signal that notifies on every write.
    pub fn always(runtime: &Runtime, value: T) -> Self {
        Self::build(runtime, value, None)
    }

    fn build(runtime: &Runtime, value: T, equals: Option<Equals<T>>) -> Self {
        Self {
            id: next_signal_id(),
            state: Rc::new(SignalState {
                value: RefCell::new(value),
                equals,
                subscriptions: RefCell::new(Subscriptions::default()),
            }),
            runtime: runtime.downgrade(),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get a clone of the current value, registering the current listeners.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the current value, registering the current listeners.
    ///
    /// The value stays borrowed while `f` runs; writing this signal from
    /// inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.state.value.borrow())
    }

    /// Get a clone of the current value without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    /// Borrow the current value without tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.value.borrow())
    }

    /// Register the current listeners without reading the value.
    pub fn track(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track(&self.state.subscriptions);
        }
    }

    /// Replace the value and notify, unless it equals the current one.
    pub fn set(&self, value: T) {
        let unchanged = match &self.state.equals {
            Some(equals) => equals(&self.state.value.borrow(), &value),
            None => false,
        };
        if unchanged {
            return;
        }

        let previous = mem::replace(&mut *self.state.value.borrow_mut(), value);
        drop(previous);
        self.notify();
    }

    /// Mutate the value in place.
    ///
    /// The equality policy is bypassed; the closure's [`UpdateOutcome`]
    /// decides whether subscribers hear about it.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R)
    where
        R: UpdateOutcome,
    {
        let changed = f(&mut self.state.value.borrow_mut()).changed();
        if changed {
            self.notify();
        }
    }

    /// Notify every registration and forget them.
    ///
    /// Inside a batch the registrations are queued; otherwise they are
    /// drained immediately, triggers first.
    pub fn notify(&self) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        let subscriptions = mem::take(&mut *self.state.subscriptions.borrow_mut());
        runtime.schedule(subscriptions);
    }

    /// Number of live registrations against this signal.
    pub fn subscriber_count(&self) -> usize {
        match self.runtime.upgrade() {
            Some(runtime) => runtime.live_count(&self.state.subscriptions.borrow()),
            None => 0,
        }
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state: Rc::clone(&self.state),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &*self.state.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl Runtime {
    /// Create a signal gated by [`same_value`].
    pub fn signal<T: PartialEq + 'static>(&self, value: T) -> Signal<T> {
        Signal::new(self, value)
    }

    /// Create a signal with a custom equality policy.
    pub fn signal_with<T, F>(&self, value: T, equals: F) -> Signal<T>
    where
        T: 'static,
        F: Fn(&T, &T) -> bool + 'static,
    {
        Signal::with_equals(self, value, equals)
    }

    /// Create a signal that notifies on every write.
    pub fn signal_always<T: 'static>(&self, value: T) -> Signal<T> {
        Signal::always(self, value)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
