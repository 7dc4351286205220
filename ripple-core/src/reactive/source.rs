//! The seam between dependencies and the watchers that enumerate them.

use super::{DependencyId, Runtime, SlotKey};

/// Anything that owns reactive slots.
///
/// Implemented by [`Cell`](super::Cell), [`ReactiveObject`](super::ReactiveObject),
/// [`Computation`](super::Computation) and the derived value types. An
/// explicit [`watch`](super::watch) subscribes to every slot listed by
/// [`slot_keys`](Source::slot_keys).
pub trait Source {
    /// The runtime the dependency belongs to.
    fn runtime(&self) -> &Runtime;

    fn dependency_id(&self) -> DependencyId;

    /// Every slot the dependency exposes right now.
    fn slot_keys(&self) -> Vec<SlotKey>;
}
