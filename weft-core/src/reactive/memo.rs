//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates eagerly whenever one of
//! its dependencies changes.
//!
//! # How Memos Work
//!
//! 1. On creation, the memo evaluates its expression once and stores the
//!    result in a private signal.
//!
//! 2. The expression is watched with trigger priority, so a change re-runs it
//!    ahead of every ordinary watcher of the same change.
//!
//! 3. The new result is written to the private signal. Equal results are
//!    swallowed by the signal's equality gate, so readers of the memo only
//!    re-run when the derived value really changed.
//!
//! Memos recompute even when nobody reads them. Use [`Lazy`](super::Lazy) to
//! defer the work until the next read.

use std::cell::OnceCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::Runtime;
use super::signal::Signal;
use super::subscriber::Priority;
use crate::error::Result;

/// A cached derived value.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. The `PartialEq` bound on
///   construction is used to detect when the computed value actually changed.
pub struct Memo<T: 'static> {
    signal: Rc<OnceCell<Signal<T>>>,
}

impl<T: 'static> Memo<T> {
    fn signal(&self) -> &Signal<T> {
        self.signal
            .get()
            .expect("memo is evaluated when it is created")
    }

    /// Get the cached value, registering the current listeners.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal().get()
    }

    /// Borrow the cached value, registering the current listeners.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal().with(f)
    }

    /// Get the cached value without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal().get_untracked()
    }

    /// Number of live registrations against the cached value.
    pub fn subscriber_count(&self) -> usize {
        self.signal().subscriber_count()
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            signal: Rc::clone(&self.signal),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("signal", &self.signal.get())
            .finish()
    }
}

impl Runtime {
    /// Create a memo over `expr`. The memo is disposed with the enclosing scope.
    pub fn memo<T, F>(&self, expr: F) -> Result<Memo<T>>
    where
        T: PartialEq + 'static,
        F: Fn() -> T + 'static,
    {
        let signal: Rc<OnceCell<Signal<T>>> = Rc::default();
        let target = Rc::clone(&signal);
        let runtime = self.downgrade();

        self.watch_with(
            expr,
            move |value| match target.get() {
                Some(signal) => signal.set(value),
                None => {
                    if let Some(runtime) = runtime.upgrade() {
                        let _ = target.set(Signal::new(&runtime, value));
                    }
                }
            },
            Priority::Trigger,
        )?;

        Ok(Memo { signal })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
