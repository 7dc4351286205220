//! Identity types for the reactive graph.
//!
//! Dependencies and computations are identified by opaque handles rather than
//! by value, so two cells holding equal contents are still distinct
//! dependencies. Slots name the individual pieces of state inside one
//! dependency.

use std::borrow::{Borrow, Cow};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Unique identifier for a computation.
///
/// Every computation (derived value, watcher or raw computation) gets one
/// when created. The runtime keys its computation table by this ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComputationId(u64);

impl ComputationId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Unique identifier for anything that owns reactive slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyId(u64);

impl DependencyId {
    /// Allocate a fresh dependency identity.
    ///
    /// Binding layers that keep their own state can use this to take part in
    /// the graph through [`Runtime::track`](super::Runtime::track) and
    /// [`Runtime::trigger`](super::Runtime::trigger).
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for DependencyId {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of one addressable piece of state within a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotKey(Cow<'static, str>);

impl SlotKey {
    /// The single slot carried by cells and computations.
    pub const VALUE: SlotKey = SlotKey(Cow::Borrowed("value"));

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for SlotKey {
    fn from(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }
}

impl From<String> for SlotKey {
    fn from(key: String) -> Self {
        Self(Cow::Owned(key))
    }
}

impl Borrow<str> for SlotKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computation_ids_are_unique() {
        let id1 = ComputationId::next();
        let id2 = ComputationId::next();
        let id3 = ComputationId::next();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn dependency_ids_are_unique() {
        assert_ne!(DependencyId::new(), DependencyId::new());
    }

    #[test]
    fn borrowed_and_owned_keys_compare_equal() {
        let owned = SlotKey::from(String::from("value"));
        assert_eq!(owned, SlotKey::VALUE);
        assert_eq!(SlotKey::from("x").to_string(), "x");
    }
}
