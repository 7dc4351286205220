//! Cell Implementation
//!
//! A Cell is the simplest dependency: one value behind one slot, `"value"`.
//!
//! # How Cells Work
//!
//! 1. Reading a cell inside an evaluating computation subscribes that
//!    computation to the cell.
//!
//! 2. Writing a cell stores the value and re-runs every subscriber.
//!
//! Writes always propagate, even when the new value equals the old one. Use
//! [`Cell::set_if_changed`] to opt into an equality check.
//!
//! # Memory Layout
//!
//! Each cell consists of:
//! - A unique dependency ID (8 bytes)
//! - A handle to its runtime
//! - The value, behind a `RwLock` shared by every clone

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{DependencyId, Runtime, SlotKey, Source};
use crate::error::Result;

struct CellInner<T> {
    id: DependencyId,
    runtime: Runtime,
    value: RwLock<T>,
}

impl<T> Drop for CellInner<T> {
    fn drop(&mut self) {
        self.runtime.release_on_drop(self.id);
    }
}

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = rt.cell(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (re-runs subscribers)
/// count.set(5)?;
/// ```
pub struct Cell<T> {
    inner: Arc<CellInner<T>>,
}

impl<T> Cell<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                id: DependencyId::new(),
                runtime: runtime.clone(),
                value: RwLock::new(value),
            }),
        }
    }
}

impl<T> Cell<T> {
    pub fn id(&self) -> DependencyId {
        self.inner.id
    }

    /// Get the current value, subscribing the active computation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.runtime.track(self.inner.id, &SlotKey::VALUE);
        self.inner.value.read().clone()
    }

    /// Borrow the current value, subscribing the active computation.
    ///
    /// The cell is read-locked while `f` runs; `f` must not write to it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.runtime.track(self.inner.id, &SlotKey::VALUE);
        f(&self.inner.value.read())
    }

    /// Get the current value without subscribing anything.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.read().clone()
    }

    /// Store a new value and re-run every subscriber.
    ///
    /// The runtime lock is held from the write until the last subscriber
    /// has finished.
    pub fn set(&self, value: T) -> Result<()> {
        let _gate = self.inner.runtime.lock();
        *self.inner.value.write() = value;
        self.inner.runtime.trigger(self.inner.id, &SlotKey::VALUE)
    }

    /// Compute the next value from the current one, then [`set`](Self::set) it.
    ///
    /// The read and the write happen under one runtime lock, so concurrent
    /// updates never lose a step.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let _gate = self.inner.runtime.lock();
        let next = f(&self.inner.value.read());
        self.set(next)
    }

    /// Store `value` only if it differs from the current value.
    ///
    /// Returns whether subscribers were re-run.
    pub fn set_if_changed(&self, value: T) -> Result<bool>
    where
        T: PartialEq,
    {
        let _gate = self.inner.runtime.lock();
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                return Ok(false);
            }
            *guard = value;
        }
        self.inner.runtime.trigger(self.inner.id, &SlotKey::VALUE)?;
        Ok(true)
    }

    /// Number of computations subscribed to this cell.
    pub fn subscriber_count(&self) -> usize {
        self.inner.runtime.subscriber_count(self.inner.id, &SlotKey::VALUE)
    }
}

impl<T> Source for Cell<T> {
    fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    fn dependency_id(&self) -> DependencyId {
        self.inner.id
    }

    fn slot_keys(&self) -> Vec<SlotKey> {
        vec![SlotKey::VALUE]
    }
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Cell<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl Runtime {
    /// Create a [`Cell`] owned by this runtime.
    pub fn cell<T>(&self, value: T) -> Cell<T>
    where
        T: Send + Sync + 'static,
    {
        Cell::new(self, value)
    }
}
