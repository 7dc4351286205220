//! Graph Nodes
//!
//! This module defines the node and edge records that make up a
//! [`GraphSnapshot`](super::GraphSnapshot).

use serde::{Deserialize, Serialize};

use crate::reactive::{ComputationId, DependencyId, SlotKey};

/// The kind of dependency a subscription points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A dependency no live computation produces: a cell, a reactive object,
    /// or an identity owned by a binding layer. These are the roots.
    Source,

    /// The output of a live computation (a derived value or a watcher).
    Computation,
}

/// A computation as it stood when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationNode {
    pub id: ComputationId,

    /// Optional diagnostic name given through
    /// [`ComputationOptions::named`](crate::reactive::ComputationOptions::named).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The dependency identity readers of this computation subscribe to.
    pub output: DependencyId,

    /// Whether the computation subscribes to what it reads.
    pub tracking: bool,

    pub runs: u64,
}

/// One subscription: `computation` re-runs when `(dependency, slot)` is
/// triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEdge {
    pub dependency: DependencyId,
    pub slot: SlotKey,
    pub computation: ComputationId,
}
