//! Reactive Primitives
//!
//! This module implements the reactive engine: cells, reactive objects,
//! computations, derived values and watchers, all managed by an explicit
//! [`Runtime`].
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell is a container for mutable state. When read inside an evaluating
//! computation, it subscribes that computation. When written, it re-runs
//! every subscriber synchronously.
//!
//! ## Reactive Objects
//!
//! A ReactiveObject is a per-property container. Each property is its own
//! slot, so readers of one property are not disturbed by writes to another.
//!
//! ## Computations
//!
//! A Computation wraps a producer. Derived values and watchers are
//! computations with particular options; the runtime itself only knows about
//! computations.
//!
//! ## Watchers
//!
//! Side-effecting computations, subscribed either explicitly ([`watch`]) or
//! automatically ([`watch_effect`]).
//!
//! # Implementation Notes
//!
//! The runtime keeps a stack of evaluating computations. When a dependency is
//! read, the runtime subscribes the top of the stack to the slot that was
//! read. This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.
//!
//! Propagation is eager and depth first: every write re-runs its subscribers
//! before returning, with no batching and no caching.

mod cell;
mod computation;
mod context;
mod derived;
mod object;
mod registry;
mod runtime;
mod source;
mod subscriber;
mod watch;

pub use cell::Cell;
pub use computation::{Computation, ComputationOptions};
pub use derived::{Derived, WritableDerived};
pub use object::ReactiveObject;
pub use runtime::Runtime;
pub use source::Source;
pub use subscriber::{ComputationId, DependencyId, SlotKey};
pub use watch::{watch, watch_effect, WatchOptions, Watcher};
