//! Weft Core
//!
//! This crate provides the core runtime for the Weft reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, watches, effects, memos)
//! - Disposal scopes that own everything created inside them
//! - Batched, glitch-free change propagation
//! - Keyed and positional list reconciliation
//!
//! Rendering, routing and stores are built on top of this surface and live
//! elsewhere.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `list`: List reconciliation over reactive sequences
//! - `config`: Runtime limits
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust
//! use weft_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let count = rt.signal(0);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     rt.memo(move || count.get() * 2).unwrap()
//! };
//!
//! // Watch it
//! let disposer = rt.capture(|| {
//!     let doubled = doubled.clone();
//!     rt.watch(move || doubled.get(), |v| println!("doubled: {v}"))
//!         .unwrap();
//! });
//!
//! // Update the signal; the watch prints "doubled: 10"
//! count.set(5);
//! disposer.dispose();
//! ```

pub mod config;
pub mod error;
pub mod list;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
