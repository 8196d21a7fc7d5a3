//! Reactive Expressions
//!
//! APIs that accept "a value or something that produces one" take an
//! [`Expr`]. Plain values are read as-is; every other variant is read through
//! the reactive primitive, so the read is tracked like any other.

use std::fmt;
use std::rc::Rc;

use super::lazy::Lazy;
use super::memo::Memo;
use super::signal::Signal;

/// A value or a reactive source of one.
pub enum Expr<T: 'static> {
    /// A constant.
    Value(T),
    Signal(Signal<T>),
    Memo(Memo<T>),
    Lazy(Lazy<T>),
    /// An arbitrary closure, evaluated on every read.
    Thunk(Rc<dyn Fn() -> T>),
}

impl<T: 'static> Expr<T> {
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    pub fn thunk(f: impl Fn() -> T + 'static) -> Self {
        Self::Thunk(Rc::new(f))
    }

    /// Read the current value, tracking the underlying source.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        match self {
            Self::Value(value) => value.clone(),
            Self::Signal(signal) => signal.get(),
            Self::Memo(memo) => memo.get(),
            Self::Lazy(lazy) => lazy.get(),
            Self::Thunk(f) => f(),
        }
    }

    /// Whether reading this expression can register a dependency.
    pub fn is_reactive(&self) -> bool {
        !matches!(self, Self::Value(_))
    }
}

impl<T: Clone + 'static> Clone for Expr<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Signal(signal) => Self::Signal(signal.clone()),
            Self::Memo(memo) => Self::Memo(memo.clone()),
            Self::Lazy(lazy) => Self::Lazy(lazy.clone()),
            Self::Thunk(f) => Self::Thunk(Rc::clone(f)),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Signal(signal) => f.debug_tuple("Signal").field(signal).finish(),
            Self::Memo(memo) => f.debug_tuple("Memo").field(memo).finish(),
            Self::Lazy(lazy) => f.debug_tuple("Lazy").field(lazy).finish(),
            Self::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

impl<T: 'static> From<Signal<T>> for Expr<T> {
    fn from(signal: Signal<T>) -> Self {
        Self::Signal(signal)
    }
}

impl<T: 'static> From<Memo<T>> for Expr<T> {
    fn from(memo: Memo<T>) -> Self {
        Self::Memo(memo)
    }
}

impl<T: 'static> From<Lazy<T>> for Expr<T> {
    fn from(lazy: Lazy<T>) -> Self {
        Self::Lazy(lazy)
    }
}

impl<T: 'static> From<Vec<T>> for Expr<Vec<T>> {
    fn from(items: Vec<T>) -> Self {
        Self::Value(items)
    }
}
