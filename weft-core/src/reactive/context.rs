//! Reactive Context
//!
//! The context stack holds the ambient state every primitive consults: the
//! nearest disposal scope and the access listeners of the computation that is
//! currently being tracked.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one `ContextStack`. Entering a scope
//! or a listener frame pushes onto the matching stack and returns a guard; the
//! guard pops when dropped, so the stacks stay balanced even when a user
//! closure panics.
//!
//! An empty scope stack behaves like a detached scope, and an empty frame
//! stack means reads are untracked.

use std::cell::RefCell;
use std::mem;

use smallvec::SmallVec;

use super::subscriber::{Listener, Priority};
use crate::error::{ReactiveError, Result};

/// A deferred cleanup callback.
pub(crate) type Teardown = Box<dyn FnOnce()>;

/// One entry of the scope stack.
pub(crate) enum ScopeSlot {
    /// Teardowns are accepted and dropped unrun.
    Detached,

    /// Teardowns are collected in registration order.
    Capture(Vec<Teardown>),

    /// Registering a teardown is an error.
    Reject,
}

impl ScopeSlot {
    pub(crate) fn capture() -> Self {
        Self::Capture(Vec::new())
    }
}

/// The access listeners installed for one tracked region.
///
/// Trigger listeners are ordered innermost first; a read registers each of
/// them in that order and then the dependant listener, if any.
#[derive(Clone, Default)]
pub(crate) struct ListenerFrame {
    triggers: SmallVec<[Listener; 2]>,
    dependant: Option<Listener>,
}

impl ListenerFrame {
    /// A frame that tracks nothing.
    pub(crate) fn untracked() -> Self {
        Self::default()
    }

    /// A fresh frame with a single listener of the given class.
    pub(crate) fn single(priority: Priority, listener: Listener) -> Self {
        match priority {
            Priority::Trigger => Self {
                triggers: SmallVec::from_elem(listener, 1),
                dependant: None,
            },
            Priority::Dependant => Self {
                triggers: SmallVec::new(),
                dependant: Some(listener),
            },
        }
    }

    /// This frame with `listener` added as the innermost trigger.
    pub(crate) fn with_trigger(mut self, listener: Listener) -> Self {
        self.triggers.insert(0, listener);
        self
    }

    pub(crate) fn triggers(&self) -> &[Listener] {
        &self.triggers
    }

    pub(crate) fn dependant(&self) -> Option<&Listener> {
        self.dependant.as_ref()
    }

    pub(crate) fn is_tracking(&self) -> bool {
        !self.triggers.is_empty() || self.dependant.is_some()
    }
}

/// Per-runtime stacks of scopes and listener frames.
#[derive(Default)]
pub(crate) struct ContextStack {
    scopes: RefCell<Vec<ScopeSlot>>,
    frames: RefCell<Vec<ListenerFrame>>,
}

impl ContextStack {
    /// Push a scope slot. It is popped when the returned guard exits or drops.
    pub(crate) fn enter_scope(&self, slot: ScopeSlot) -> ScopeEntry<'_> {
        let mut scopes = self.scopes.borrow_mut();
        scopes.push(slot);
        ScopeEntry {
            stack: self,
            depth: scopes.len(),
            active: true,
        }
    }

    /// Push a listener frame. It is popped when the returned guard drops.
    pub(crate) fn enter_frame(&self, frame: ListenerFrame) -> FrameEntry<'_> {
        let mut frames = self.frames.borrow_mut();
        frames.push(frame);
        FrameEntry {
            stack: self,
            depth: frames.len(),
        }
    }

    /// A copy of the innermost listener frame.
    pub(crate) fn current_frame(&self) -> ListenerFrame {
        self.frames.borrow().last().cloned().unwrap_or_default()
    }

    /// Run `f` against the innermost frame, if it tracks anything.
    pub(crate) fn with_tracking<R>(&self, f: impl FnOnce(&ListenerFrame) -> R) -> Option<R> {
        let frames = self.frames.borrow();
        frames.last().filter(|frame| frame.is_tracking()).map(f)
    }

    pub(crate) fn is_tracking(&self) -> bool {
        self.frames
            .borrow()
            .last()
            .is_some_and(ListenerFrame::is_tracking)
    }

    /// Hand a teardown to the innermost scope.
    pub(crate) fn register_teardown(&self, teardown: Teardown) -> Result<()> {
        let mut scopes = self.scopes.borrow_mut();
        match scopes.last_mut() {
            None | Some(ScopeSlot::Detached) => Ok(()),
            Some(ScopeSlot::Capture(list)) => {
                list.push(teardown);
                Ok(())
            }
            Some(ScopeSlot::Reject) => Err(ReactiveError::TeardownRejected),
        }
    }

    pub(crate) fn scope_depth(&self) -> usize {
        self.scopes.borrow().len()
    }
}

/// Guard for an entered scope slot.
pub(crate) struct ScopeEntry<'a> {
    stack: &'a ContextStack,
    depth: usize,
    active: bool,
}

impl ScopeEntry<'_> {
    /// Pop the slot and return the teardowns it collected.
    pub(crate) fn exit(mut self) -> Vec<Teardown> {
        self.active = false;
        self.pop()
    }

    fn pop(&self) -> Vec<Teardown> {
        let mut scopes = self.stack.scopes.borrow_mut();
        debug_assert_eq!(
            scopes.len(),
            self.depth,
            "scope stack mismatch: expected depth {}, got {}",
            self.depth,
            scopes.len()
        );
        match scopes.pop() {
            Some(ScopeSlot::Capture(list)) => list,
            _ => Vec::new(),
        }
    }
}

impl Drop for ScopeEntry<'_> {
    fn drop(&mut self) {
        if self.active {
            // Unwinding out of the scope body: the collected teardowns are
            // dropped unrun.
            let abandoned = self.pop();
            mem::drop(abandoned);
        }
    }
}

/// Guard for an entered listener frame.
pub(crate) struct FrameEntry<'a> {
    stack: &'a ContextStack,
    depth: usize,
}

impl Drop for FrameEntry<'_> {
    fn drop(&mut self) {
        let mut frames = self.stack.frames.borrow_mut();
        debug_assert_eq!(
            frames.len(),
            self.depth,
            "listener frame mismatch: expected depth {}, got {}",
            self.depth,
            frames.len()
        );
        frames.pop();
    }
}
