//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, watches, memos
//! and the scopes that own them. These primitives form the foundation of
//! Weft's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracked region (a watch expression, a memo, an effect), the signal
//! registers that region's listeners. When the value changes, those listeners
//! are notified once and forgotten.
//!
//! ## Watches and Effects
//!
//! A watch re-runs a reaction with the value of a tracked expression whenever
//! a dependency changes. An effect is a single body that is both tracked and
//! allowed to register teardowns.
//!
//! ## Memos and Lazies
//!
//! A Memo is a derived value that re-evaluates eagerly, ahead of ordinary
//! watchers. A Lazy only marks itself dirty and re-evaluates on the next read.
//!
//! ## Scopes
//!
//! Every watch, memo and lazy registers a teardown with the innermost scope.
//! [`Runtime::capture`] collects those teardowns into a [`Disposer`].
//!
//! # Implementation Notes
//!
//! Each [`Runtime`] owns a context stack of listener frames and scope slots.
//! A read consults the innermost frame; a teardown goes to the innermost
//! scope. Subscriber entries live in a generational arena owned by the
//! runtime, and signals hold only their IDs.
//!
//! A change drains triggers first, with their own writes held back until they
//! settle, which keeps derived values consistent before any watcher observes
//! them. Watchers then run with no batch open, so their writes take effect
//! before the write call returns.

mod context;
mod effect;
mod expr;
mod lazy;
mod memo;
mod runtime;
mod scope;
mod signal;
mod subscriber;
mod trigger;

pub(crate) use runtime::WeakRuntime;

pub use expr::Expr;
pub use lazy::Lazy;
pub use memo::Memo;
pub use runtime::Runtime;
pub use scope::Disposer;
pub use signal::{same_value, Signal, UpdateOutcome};
pub use subscriber::{Priority, SubscriberId};
