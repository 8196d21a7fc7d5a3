//! Disposal Scopes
//!
//! A scope collects teardown callbacks registered while a closure runs and
//! hands them back as a [`Disposer`]. Watches, memos and reconciler instances
//! are all bound to the scope they were created in: disposing the scope stops
//! them and runs their cleanup.
//!
//! Three kinds of region exist:
//!
//! - [`Runtime::capture`] collects teardowns.
//! - [`Runtime::uncapture`] accepts teardowns and drops them, detaching
//!   anything created inside from the surrounding scope.
//! - [`Runtime::inert`] rejects teardowns with
//!   [`ReactiveError::TeardownRejected`](crate::ReactiveError::TeardownRejected).
//!   Tracked expressions run in an inert region.

use std::fmt;

use tracing::trace;

use super::context::{ScopeSlot, Teardown};
use super::Runtime;
use crate::error::Result;

/// Teardowns collected by one [`Runtime::capture`].
///
/// Dropping a `Disposer` without calling [`Disposer::dispose`] drops its
/// teardowns unrun.
#[must_use = "dropping a Disposer discards its teardowns without running them"]
#[derive(Default)]
pub struct Disposer {
    teardowns: Vec<Teardown>,
}

impl Disposer {
    pub(crate) fn new(teardowns: Vec<Teardown>) -> Self {
        Self { teardowns }
    }

    /// Run every teardown, most recently registered first.
    ///
    /// If a teardown panics, the ones registered before it do not run.
    pub fn dispose(self) {
        trace!(count = self.teardowns.len(), "dispose scope");
        for teardown in self.teardowns.into_iter().rev() {
            teardown();
        }
    }

    /// Number of teardowns held.
    pub fn len(&self) -> usize {
        self.teardowns.len()
    }

    /// Whether there is nothing to tear down.
    pub fn is_empty(&self) -> bool {
        self.teardowns.is_empty()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("teardowns", &self.teardowns.len())
            .finish()
    }
}

impl Runtime {
    /// Run `f` in a fresh capturing scope and return its teardowns.
    pub fn capture(&self, f: impl FnOnce()) -> Disposer {
        self.capture_with(f).1
    }

    /// Like [`Runtime::capture`], also returning the closure's value.
    pub fn capture_with<R>(&self, f: impl FnOnce() -> R) -> (R, Disposer) {
        let entry = self.context().enter_scope(ScopeSlot::capture());
        let value = f();
        (value, Disposer::new(entry.exit()))
    }

    /// Register `f` with the innermost scope.
    ///
    /// Outside any capture the callback is dropped unrun. Inside an inert
    /// region this is an error.
    pub fn teardown(&self, f: impl FnOnce() + 'static) -> Result<()> {
        self.context().register_teardown(Box::new(f))
    }

    /// Run `f` detached from the surrounding scope.
    pub fn uncapture<R>(&self, f: impl FnOnce() -> R) -> R {
        let _entry = self.context().enter_scope(ScopeSlot::Detached);
        f()
    }

    /// Run `f` in a region where registering a teardown is an error.
    pub fn inert<R>(&self, f: impl FnOnce() -> R) -> R {
        let _entry = self.context().enter_scope(ScopeSlot::Reject);
        f()
    }
}
