//! List Reconciliation
//!
//! This module maps a reactive sequence onto a list of per-item instances and
//! keeps that list in step with the sequence as it changes.
//!
//! # Variants
//!
//! - [`Runtime::for_each`](crate::reactive::Runtime::for_each) keys instances
//!   by value. An item that survives a change keeps its instance, even if it
//!   moved; only its index signal is rewritten.
//! - [`Runtime::index_for`](crate::reactive::Runtime::index_for) keys
//!   instances by position. A changed value at a stable position is written
//!   into that instance's value signal in place.
//!
//! Each instance runs its item callback inside its own capturing scope. When
//! the instance is removed, that scope is disposed.
//!
//! # Rendered Region
//!
//! A [`ListHandle`] publishes the current views in order. The rendered region
//! ends with a [`Node::Anchor`], so an empty list still has a boundary.

mod indexed;
mod instance;
mod keyed;

use std::cell::Cell;
use std::fmt;
use std::ops::AddAssign;
use std::rc::Rc;

use serde::Serialize;

use crate::reactive::{Runtime, Signal};

/// One node of a rendered list region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<V> {
    /// The view of the instance at this position.
    Item(V),

    /// Stable placeholder that closes the region.
    Anchor,
}

/// Work done by reconciliation passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Instances created.
    pub created: usize,

    /// Instances disposed.
    pub disposed: usize,

    /// Instances relocated to an earlier position.
    pub moved: usize,

    /// Positions served by an instance that already existed.
    pub reused: usize,

    /// Extra positions rendered by an instance already placed this pass.
    pub duplicates: usize,
}

impl AddAssign for ReconcileStats {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.disposed += other.disposed;
        self.moved += other.moved;
        self.reused += other.reused;
        self.duplicates += other.duplicates;
    }
}

/// Ordered, boundary-tracking view of a reconciled list.
pub struct ListHandle<V: 'static> {
    views: Signal<Vec<V>>,
    last: Rc<Cell<ReconcileStats>>,
    totals: Rc<Cell<ReconcileStats>>,
}

impl<V: 'static> ListHandle<V> {
    pub(crate) fn new(runtime: &Runtime) -> Self {
        Self {
            views: runtime.signal_always(Vec::new()),
            last: Rc::default(),
            totals: Rc::default(),
        }
    }

    /// Replace the views and record one pass.
    pub(crate) fn publish(&self, views: Vec<V>, stats: ReconcileStats) {
        self.last.set(stats);
        let mut totals = self.totals.get();
        totals += stats;
        self.totals.set(totals);
        self.views.set(views);
    }

    /// The rendered region: every view in order, then the anchor.
    pub fn nodes(&self) -> Vec<Node<V>>
    where
        V: Clone,
    {
        self.views.with(|views| {
            views
                .iter()
                .cloned()
                .map(Node::Item)
                .chain(std::iter::once(Node::Anchor))
                .collect()
        })
    }

    /// Current views in order.
    pub fn views(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.views.get()
    }

    /// Borrow the current views.
    pub fn with_views<R>(&self, f: impl FnOnce(&[V]) -> R) -> R {
        self.views.with(|views| f(views))
    }

    /// Number of rendered positions.
    pub fn len(&self) -> usize {
        self.views.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Work done by the most recent pass.
    pub fn stats(&self) -> ReconcileStats {
        self.last.get()
    }

    /// Work done by every pass so far.
    pub fn totals(&self) -> ReconcileStats {
        self.totals.get()
    }
}

impl<V: 'static> Clone for ListHandle<V> {
    fn clone(&self) -> Self {
        Self {
            views: self.views.clone(),
            last: Rc::clone(&self.last),
            totals: Rc::clone(&self.totals),
        }
    }
}

impl<V: fmt::Debug + 'static> fmt::Debug for ListHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListHandle")
            .field("views", &self.views)
            .field("stats", &self.last.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
