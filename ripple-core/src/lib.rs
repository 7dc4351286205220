//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive state engine.
//! It implements:
//!
//! - Reactive primitives (cells, reactive objects, derived values, watchers)
//! - Automatic dependency tracking through an active-computation stack
//! - Synchronous, depth-first change propagation
//! - Graph snapshots for inspecting the subscription graph
//!
//! Rendering and binding layers sit on top: they wrap their own update
//! routines in a computation and let the reads inside subscribe it.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Serializable snapshots of the subscription graph
//! - `config`: Runtime policies (failure handling, re-entrancy, pruning)
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//!
//! // Create a cell
//! let count = rt.cell(0);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = rt.derived(move || c.get() * 2)?;
//!
//! // Create a watcher
//! let (c, d) = (count.clone(), doubled.clone());
//! rt.watch_effect(move || {
//!     println!("Count: {}, Doubled: {}", c.get(), d.get().unwrap());
//! })?;
//!
//! // Update the cell
//! count.set(5)?;
//! // Watcher runs again, prints: "Count: 5, Doubled: 10"
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
