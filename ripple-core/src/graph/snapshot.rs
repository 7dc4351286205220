//! Graph Snapshots
//!
//! A [`GraphSnapshot`] is a point-in-time copy of a runtime's computation
//! table and subscription edges. It owns its data, so it can be inspected,
//! encoded, or shipped elsewhere while the runtime keeps running.
//!
//! # Ordering
//!
//! Propagation itself never sorts anything: subscribers run in the order they
//! subscribed. [`topological_order`](GraphSnapshot::topological_order) is a
//! diagnostic. It answers "could these computations be ordered so producers
//! run before readers?", and reports a cycle when they cannot. A cycle means
//! some write can feed back into itself.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::node::{ComputationNode, NodeKind, SubscriptionEdge};
use crate::error::Result;
use crate::reactive::{ComputationId, DependencyId, Runtime};

/// Serializable copy of a runtime's subscription graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Process-unique id of the runtime the snapshot was taken from.
    pub runtime: u64,

    /// Live computations, in registration order.
    pub computations: Vec<ComputationNode>,

    /// Subscription edges, grouped by dependency. Within one slot, edges keep
    /// subscription order.
    pub subscriptions: Vec<SubscriptionEdge>,
}

impl GraphSnapshot {
    pub fn computation(&self, id: ComputationId) -> Option<&ComputationNode> {
        self.computations.iter().find(|node| node.id == id)
    }

    /// Edges pointing at `computation`.
    pub fn dependencies_of(&self, computation: ComputationId) -> Vec<&SubscriptionEdge> {
        self.subscriptions
            .iter()
            .filter(|edge| edge.computation == computation)
            .collect()
    }

    /// Edges leaving `dependency`, in the order a trigger would visit them.
    pub fn subscribers_of(&self, dependency: DependencyId) -> Vec<&SubscriptionEdge> {
        self.subscriptions
            .iter()
            .filter(|edge| edge.dependency == dependency)
            .collect()
    }

    pub fn dependency_kind(&self, dependency: DependencyId) -> NodeKind {
        if self.computations.iter().any(|node| node.output == dependency) {
            NodeKind::Computation
        } else {
            NodeKind::Source
        }
    }

    /// Order computations so that every computation comes after the
    /// computations whose output it reads.
    ///
    /// Returns `None` when the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<ComputationId>> {
        let producers: HashMap<DependencyId, ComputationId> = self
            .computations
            .iter()
            .map(|node| (node.output, node.id))
            .collect();

        // Distinct computation-to-computation edges.
        let mut readers: HashMap<ComputationId, Vec<ComputationId>> = HashMap::new();
        let mut in_degree: HashMap<ComputationId, usize> =
            self.computations.iter().map(|node| (node.id, 0)).collect();
        let mut seen = HashSet::new();

        for edge in &self.subscriptions {
            let Some(&producer) = producers.get(&edge.dependency) else {
                continue;
            };
            if !in_degree.contains_key(&edge.computation) {
                continue;
            }
            if seen.insert((producer, edge.computation)) {
                readers.entry(producer).or_default().push(edge.computation);
                if let Some(degree) = in_degree.get_mut(&edge.computation) {
                    *degree += 1;
                }
            }
        }

        // Kahn's algorithm, seeded in registration order.
        let mut queue: VecDeque<ComputationId> = self
            .computations
            .iter()
            .map(|node| node.id)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut result = Vec::with_capacity(self.computations.len());

        while let Some(id) = queue.pop_front() {
            result.push(id);

            for reader in readers.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(reader) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(*reader);
                    }
                }
            }
        }

        (result.len() == self.computations.len()).then_some(result)
    }

    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_none()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as MessagePack with field names.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }
}

impl Runtime {
    /// Copy the current computation table and subscription edges.
    pub fn snapshot(&self) -> GraphSnapshot {
        let (computations, mut subscriptions) = self.with_state(|state| {
            let computations: Vec<ComputationNode> = state
                .registry
                .computations()
                .map(|(id, entry)| ComputationNode {
                    id: *id,
                    name: entry.name.as_ref().map(|name| name.to_string()),
                    output: entry.output,
                    tracking: entry.tracking,
                    runs: entry.runs,
                })
                .collect();

            let subscriptions: Vec<SubscriptionEdge> = state
                .registry
                .edges()
                .map(|(dependency, slot, computation)| SubscriptionEdge {
                    dependency,
                    slot: slot.clone(),
                    computation,
                })
                .collect();

            (computations, subscriptions)
        });

        subscriptions.sort_by_key(|edge| edge.dependency);

        tracing::trace!(
            runtime = self.id(),
            computations = computations.len(),
            subscriptions = subscriptions.len(),
            "graph snapshot"
        );

        GraphSnapshot {
            runtime: self.id(),
            computations,
            subscriptions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ComputationOptions, SlotKey, Source};

    #[test]
    fn snapshot_lists_computations_and_edges() {
        let rt = Runtime::new();
        let a = rt.cell(1);
        let b = rt.cell(2);

        let (a2, b2) = (a.clone(), b.clone());
        let sum = rt.derived(move || a2.get() + b2.get()).unwrap();

        let snapshot = rt.snapshot();
        assert_eq!(snapshot.computations.len(), 1);
        assert_eq!(snapshot.computations[0].id, sum.id());
        assert_eq!(snapshot.computations[0].runs, 1);
        assert!(snapshot.computations[0].tracking);

        let deps = snapshot.dependencies_of(sum.id());
        assert_eq!(deps.len(), 2);
        assert!(deps.iter().all(|edge| edge.slot == SlotKey::VALUE));
        assert_eq!(snapshot.dependency_kind(a.id()), NodeKind::Source);
        assert_eq!(snapshot.dependency_kind(sum.dependency_id()), NodeKind::Computation);
    }

    #[test]
    fn names_are_recorded() {
        let rt = Runtime::new();
        let _named = rt
            .computation(|| (), ComputationOptions::default().named("render"))
            .unwrap();

        let snapshot = rt.snapshot();
        assert_eq!(snapshot.computations[0].name.as_deref(), Some("render"));
    }

    #[test]
    fn chain_orders_producers_first() {
        let rt = Runtime::new();
        let cell = rt.cell(1);

        let c = cell.clone();
        let doubled = rt.derived(move || c.get() * 2).unwrap();
        let d = doubled.clone();
        let quadrupled = rt.derived(move || d.get().unwrap() * 2).unwrap();
        let q = quadrupled.clone();
        let watcher = rt
            .watch_effect(move || {
                q.get().unwrap();
            })
            .unwrap();

        let order = rt.snapshot().topological_order().unwrap();
        let position = |id| order.iter().position(|x| *x == id).unwrap();
        assert!(position(doubled.id()) < position(quadrupled.id()));
        assert!(position(quadrupled.id()) < position(watcher.id()));
    }

    #[test]
    fn self_subscription_is_a_cycle() {
        let rt = Runtime::new();
        let computation = rt.computation(|| (), ComputationOptions::default()).unwrap();
        computation
            .track(computation.dependency_id(), &SlotKey::VALUE)
            .unwrap();

        assert!(rt.snapshot().has_cycle());
    }

    #[test]
    fn json_round_trip() {
        let rt = Runtime::new();
        let cell = rt.cell(0);
        let c = cell.clone();
        let _derived = rt.derived(move || c.get()).unwrap();

        let snapshot = rt.snapshot();
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"subscriptions\""));
        assert_eq!(GraphSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn msgpack_uses_field_names() {
        let rt = Runtime::new();
        let _computation = rt.computation(|| (), ComputationOptions::default()).unwrap();

        let bytes = rt.snapshot().to_msgpack().unwrap();
        let decoded: GraphSnapshot = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded.computations.len(), 1);
    }

    #[test]
    fn snapshot_is_detached_from_runtime() {
        let rt = Runtime::new();
        let computation = rt.computation(|| (), ComputationOptions::default()).unwrap();
        let snapshot = rt.snapshot();

        computation.dispose();
        assert_eq!(snapshot.computations.len(), 1);
        assert!(rt.snapshot().computations.is_empty());
    }
}
