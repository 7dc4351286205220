//! Dependency Graph
//!
//! This module exposes the subscription graph a runtime maintains, as a
//! serializable snapshot.
//!
//! # Overview
//!
//! The graph is bipartite:
//!
//! - Dependencies are identities (a cell, a reactive object, a computation's
//!   output) with named slots
//! - Computations subscribe to `(dependency, slot)` pairs
//!
//! When a slot is triggered, every subscriber of that slot re-runs. A
//! computation whose output is itself read by another computation links the
//! two, so chains and diamonds show up as paths through the snapshot.

mod node;
mod snapshot;

pub use node::{ComputationNode, NodeKind, SubscriptionEdge};
pub use snapshot::GraphSnapshot;
