//! Subscription Registry
//!
//! The registry is the propagation substrate. It maps every
//! `(dependency, slot)` pair to the computations subscribed to it, and owns
//! the table of live computations (an arena keyed by [`ComputationId`]).
//!
//! Both directions of every edge are stored: the registry's subscriber sets
//! answer "who must re-run when this slot changes", and each computation's
//! local record answers "what does this computation read". The two are kept
//! in lock step by [`Registry::subscribe`], [`Registry::unsubscribe`] and
//! [`Registry::prune`].
//!
//! Subscriber sets are `IndexSet`s: insertion is idempotent and iteration
//! follows insertion order, which is the only ordering propagation promises.
//!
//! Nothing in here runs user code. Callers collect what they need and release
//! the state borrow before invoking a producer.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use super::{ComputationId, DependencyId, SlotKey};
use crate::error::{ReactiveError, Result};

/// Type-erased re-run entry point of a computation.
pub(crate) type Runner = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// One edge in a computation's local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Subscription {
    /// Run epoch in which the slot was last read.
    pub(crate) epoch: u64,
    /// Created through an explicit `track` call; never pruned.
    pub(crate) explicit: bool,
}

/// A computation as the registry sees it.
pub(crate) struct ComputationEntry {
    pub(crate) name: Option<Cow<'static, str>>,
    pub(crate) runner: Runner,
    pub(crate) tracking: bool,
    /// Re-runs trigger the computation's own `"value"` slot.
    pub(crate) propagate: bool,
    /// Dependency identity of the computation's own `"value"` slot.
    pub(crate) output: DependencyId,
    pub(crate) sources: IndexMap<DependencyId, IndexMap<SlotKey, Subscription>>,
    pub(crate) epoch: u64,
    pub(crate) runs: u64,
}

impl ComputationEntry {
    pub(crate) fn new(
        runner: Runner,
        tracking: bool,
        output: DependencyId,
        name: Option<Cow<'static, str>>,
    ) -> Self {
        Self {
            name,
            runner,
            tracking,
            propagate: false,
            output,
            sources: IndexMap::new(),
            epoch: 0,
            runs: 0,
        }
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.sources.values().map(IndexMap::len).sum()
    }
}

/// What a run needs once the state borrow is released.
pub(crate) struct RunTicket {
    pub(crate) runner: Runner,
    pub(crate) tracking: bool,
    pub(crate) propagate: bool,
    pub(crate) output: DependencyId,
    pub(crate) epoch: u64,
}

type SlotSubscribers = IndexMap<SlotKey, IndexSet<ComputationId>>;

#[derive(Default)]
pub(crate) struct Registry {
    subscribers: HashMap<DependencyId, SlotSubscribers>,
    computations: IndexMap<ComputationId, ComputationEntry>,
}

impl Registry {
    pub(crate) fn insert(&mut self, id: ComputationId, entry: ComputationEntry) {
        self.computations.insert(id, entry);
    }

    pub(crate) fn contains(&self, id: ComputationId) -> bool {
        self.computations.contains_key(&id)
    }

    pub(crate) fn entry(&self, id: ComputationId) -> Option<&ComputationEntry> {
        self.computations.get(&id)
    }

    pub(crate) fn computations(&self) -> impl Iterator<Item = (&ComputationId, &ComputationEntry)> {
        self.computations.iter()
    }

    /// Every `(dependency, slot, subscriber)` edge.
    pub(crate) fn edges(&self) -> impl Iterator<Item = (DependencyId, &SlotKey, ComputationId)> {
        self.subscribers.iter().flat_map(|(dependency, slots)| {
            slots.iter().flat_map(move |(slot, subscribers)| {
                subscribers.iter().map(move |id| (*dependency, slot, *id))
            })
        })
    }

    /// Record that `id` reads `(dependency, slot)`.
    ///
    /// Returns `true` when the edge is new. Re-subscribing refreshes the
    /// edge's epoch and keeps its position in the subscriber set.
    pub(crate) fn subscribe(
        &mut self,
        id: ComputationId,
        dependency: DependencyId,
        slot: &SlotKey,
        explicit: bool,
    ) -> Result<bool> {
        let entry = self
            .computations
            .get_mut(&id)
            .ok_or(ReactiveError::UnknownComputation(id))?;

        let epoch = entry.epoch;
        let record = entry.sources.entry(dependency).or_default();
        let created = match record.get_mut(slot) {
            Some(existing) => {
                existing.epoch = epoch;
                existing.explicit |= explicit;
                false
            }
            None => {
                record.insert(slot.clone(), Subscription { epoch, explicit });
                true
            }
        };

        self.subscribers
            .entry(dependency)
            .or_default()
            .entry(slot.clone())
            .or_default()
            .insert(id);

        Ok(created)
    }

    /// Remove one edge in both directions. Returns whether it existed.
    pub(crate) fn unsubscribe(
        &mut self,
        id: ComputationId,
        dependency: DependencyId,
        slot: &SlotKey,
    ) -> bool {
        let removed = self
            .computations
            .get_mut(&id)
            .and_then(|entry| {
                let record = entry.sources.get_mut(&dependency)?;
                let removed = record.shift_remove(slot);
                if record.is_empty() {
                    entry.sources.shift_remove(&dependency);
                }
                removed
            })
            .is_some();

        self.detach(id, dependency, slot);
        removed
    }

    fn detach(&mut self, id: ComputationId, dependency: DependencyId, slot: &SlotKey) {
        let Some(slots) = self.subscribers.get_mut(&dependency) else {
            return;
        };
        if let Some(set) = slots.get_mut(slot) {
            set.shift_remove(&id);
            if set.is_empty() {
                slots.shift_remove(slot);
            }
        }
        if slots.is_empty() {
            self.subscribers.remove(&dependency);
        }
    }

    /// Snapshot of the subscribers of one slot, in insertion order.
    pub(crate) fn subscribers_of(
        &self,
        dependency: DependencyId,
        slot: &SlotKey,
    ) -> SmallVec<[ComputationId; 4]> {
        self.subscribers
            .get(&dependency)
            .and_then(|slots| slots.get(slot))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn subscriber_count(&self, dependency: DependencyId, slot: &SlotKey) -> usize {
        self.subscribers
            .get(&dependency)
            .and_then(|slots| slots.get(slot))
            .map_or(0, IndexSet::len)
    }

    /// Open a new run epoch for `id`.
    pub(crate) fn begin_run(&mut self, id: ComputationId) -> Option<RunTicket> {
        let entry = self.computations.get_mut(&id)?;
        entry.epoch += 1;
        entry.runs += 1;
        Some(RunTicket {
            runner: Arc::clone(&entry.runner),
            tracking: entry.tracking,
            propagate: entry.propagate,
            output: entry.output,
            epoch: entry.epoch,
        })
    }

    /// Drop every automatically tracked edge of `id` last read before `epoch`.
    pub(crate) fn prune(
        &mut self,
        id: ComputationId,
        epoch: u64,
    ) -> SmallVec<[(DependencyId, SlotKey); 4]> {
        let Some(entry) = self.computations.get(&id) else {
            return SmallVec::new();
        };

        let stale: SmallVec<[(DependencyId, SlotKey); 4]> = entry
            .sources
            .iter()
            .flat_map(|(dependency, slots)| {
                slots
                    .iter()
                    .filter(|(_, sub)| !sub.explicit && sub.epoch < epoch)
                    .map(move |(slot, _)| (*dependency, slot.clone()))
            })
            .collect();

        for (dependency, slot) in &stale {
            self.unsubscribe(id, *dependency, slot);
        }
        stale
    }

    /// Forget a dependency: clear its subscriber sets and strip it from every
    /// subscriber's local record. Returns the number of edges removed.
    pub(crate) fn release_dependency(&mut self, dependency: DependencyId) -> usize {
        let Some(slots) = self.subscribers.remove(&dependency) else {
            return 0;
        };

        let mut removed = 0;
        for subscribers in slots.values() {
            for id in subscribers {
                if let Some(entry) = self.computations.get_mut(id) {
                    entry.sources.shift_remove(&dependency);
                }
                removed += 1;
            }
        }
        removed
    }

    /// Remove a computation and every edge touching it.
    ///
    /// The entry is handed back so the caller can drop it (and whatever its
    /// closures captured) after releasing the state borrow.
    pub(crate) fn remove(&mut self, id: ComputationId) -> Option<ComputationEntry> {
        let entry = self.computations.shift_remove(&id)?;

        for (dependency, slots) in &entry.sources {
            for slot in slots.keys() {
                self.detach(id, *dependency, slot);
            }
        }
        self.release_dependency(entry.output);

        Some(entry)
    }

    /// Remove everything.
    pub(crate) fn drain(&mut self) -> Vec<ComputationEntry> {
        self.subscribers.clear();
        self.computations.drain(..).map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ComputationEntry {
        ComputationEntry::new(Arc::new(|| Ok(())), true, DependencyId::new(), None)
    }

    fn registry_with(ids: &[ComputationId]) -> Registry {
        let mut registry = Registry::default();
        for id in ids {
            registry.insert(*id, entry());
        }
        registry
    }

    #[test]
    fn subscribe_is_idempotent() {
        let id = ComputationId::next();
        let dep = DependencyId::new();
        let mut registry = registry_with(&[id]);

        assert!(registry.subscribe(id, dep, &SlotKey::VALUE, false).unwrap());
        assert!(!registry.subscribe(id, dep, &SlotKey::VALUE, false).unwrap());

        assert_eq!(registry.subscriber_count(dep, &SlotKey::VALUE), 1);
        assert_eq!(registry.entry(id).unwrap().dependency_count(), 1);
    }

    #[test]
    fn subscribe_unknown_computation_fails() {
        let mut registry = Registry::default();
        let id = ComputationId::next();
        let err = registry
            .subscribe(id, DependencyId::new(), &SlotKey::VALUE, false)
            .unwrap_err();
        assert!(matches!(err, ReactiveError::UnknownComputation(got) if got == id));
    }

    #[test]
    fn subscribers_keep_insertion_order() {
        let ids: Vec<_> = (0..4).map(|_| ComputationId::next()).collect();
        let dep = DependencyId::new();
        let mut registry = registry_with(&ids);

        for id in ids.iter().rev() {
            registry.subscribe(*id, dep, &SlotKey::VALUE, false).unwrap();
        }
        // Re-subscribing the first one must not move it.
        registry.subscribe(ids[3], dep, &SlotKey::VALUE, false).unwrap();

        let order: Vec<_> = registry
            .subscribers_of(dep, &SlotKey::VALUE)
            .into_iter()
            .collect();
        let expected: Vec<_> = ids.iter().rev().copied().collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn unsubscribe_removes_both_directions() {
        let id = ComputationId::next();
        let dep = DependencyId::new();
        let mut registry = registry_with(&[id]);

        registry.subscribe(id, dep, &SlotKey::from("x"), true).unwrap();
        assert!(registry.unsubscribe(id, dep, &SlotKey::from("x")));
        assert!(!registry.unsubscribe(id, dep, &SlotKey::from("x")));

        assert_eq!(registry.subscriber_count(dep, &SlotKey::from("x")), 0);
        assert_eq!(registry.entry(id).unwrap().dependency_count(), 0);
        assert_eq!(registry.edges().count(), 0);
    }

    #[test]
    fn prune_drops_stale_tracked_edges_only() {
        let id = ComputationId::next();
        let a = DependencyId::new();
        let b = DependencyId::new();
        let watched = DependencyId::new();
        let mut registry = registry_with(&[id]);

        let first = registry.begin_run(id).unwrap();
        registry.subscribe(id, a, &SlotKey::VALUE, false).unwrap();
        registry.subscribe(id, b, &SlotKey::VALUE, false).unwrap();
        registry.subscribe(id, watched, &SlotKey::VALUE, true).unwrap();
        assert!(registry.prune(id, first.epoch).is_empty());

        let second = registry.begin_run(id).unwrap();
        registry.subscribe(id, a, &SlotKey::VALUE, false).unwrap();
        let stale = registry.prune(id, second.epoch);

        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0, b);
        assert_eq!(registry.subscriber_count(a, &SlotKey::VALUE), 1);
        assert_eq!(registry.subscriber_count(b, &SlotKey::VALUE), 0);
        assert_eq!(registry.subscriber_count(watched, &SlotKey::VALUE), 1);
    }

    #[test]
    fn remove_detaches_sources_and_output() {
        let upstream = ComputationId::next();
        let downstream = ComputationId::next();
        let source = DependencyId::new();
        let mut registry = registry_with(&[upstream, downstream]);
        let output = registry.entry(upstream).unwrap().output;

        registry.subscribe(upstream, source, &SlotKey::VALUE, false).unwrap();
        registry.subscribe(downstream, output, &SlotKey::VALUE, false).unwrap();

        assert!(registry.remove(upstream).is_some());
        assert!(!registry.contains(upstream));
        assert_eq!(registry.subscriber_count(source, &SlotKey::VALUE), 0);
        assert_eq!(registry.subscriber_count(output, &SlotKey::VALUE), 0);
        assert_eq!(registry.entry(downstream).unwrap().dependency_count(), 0);
    }

    #[test]
    fn release_dependency_counts_edges() {
        let ids = [ComputationId::next(), ComputationId::next()];
        let dep = DependencyId::new();
        let mut registry = registry_with(&ids);

        registry.subscribe(ids[0], dep, &SlotKey::from("x"), false).unwrap();
        registry.subscribe(ids[1], dep, &SlotKey::from("y"), false).unwrap();

        assert_eq!(registry.release_dependency(dep), 2);
        assert_eq!(registry.release_dependency(dep), 0);
        assert_eq!(registry.entry(ids[0]).unwrap().dependency_count(), 0);
    }
}
