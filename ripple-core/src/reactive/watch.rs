//! Watchers
//!
//! A watcher is a computation that exists for its side effects. There are two
//! flavours:
//!
//! - [`watch`] subscribes explicitly to every slot of the dependencies it is
//!   given and never tracks what its callback reads. It is coarse-grained:
//!   watching a reactive object fires on a change to *any* of its properties.
//!
//! - [`watch_effect`] runs its callback immediately and subscribes to
//!   whatever the callback reads, on every run.
//!
//! # Use Cases
//!
//! Watchers synchronise reactive state with the outside world: updating a
//! rendered text node, logging, writing to a file.

use std::fmt;

use super::computation::Computation;
use super::{ComputationId, ComputationOptions, Runtime, Source};
use crate::error::Result;

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Invoke the callback once at construction.
    pub immediate: bool,
}

impl WatchOptions {
    pub fn immediate() -> Self {
        Self { immediate: true }
    }
}

/// Handle to a running watcher.
///
/// Dropping the handle does not stop the watcher; call
/// [`dispose`](Watcher::dispose).
#[derive(Clone)]
pub struct Watcher {
    computation: Computation<()>,
}

impl Watcher {
    pub fn id(&self) -> ComputationId {
        self.computation.id()
    }

    /// Stop reacting. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        self.computation.dispose()
    }

    pub fn is_alive(&self) -> bool {
        self.computation.is_alive()
    }

    /// Number of times the callback has run.
    pub fn run_count(&self) -> u64 {
        self.computation.run_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.computation.dependency_count()
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .finish()
    }
}

/// Invoke `callback` every time one of `dependencies` changes.
///
/// Every dependency must belong to `runtime`; this is checked before the
/// callback runs for the first time. The callback's own reads subscribe
/// nothing.
pub fn watch<F>(
    runtime: &Runtime,
    dependencies: &[&dyn Source],
    callback: F,
    options: WatchOptions,
) -> Result<Watcher>
where
    F: Fn() + Send + Sync + 'static,
{
    for dependency in dependencies {
        runtime.ensure_same(dependency.runtime())?;
    }

    let mut computation_options = ComputationOptions::default().untracked();
    computation_options.run_immediately = options.immediate;

    let computation = Computation::new(runtime, callback, computation_options)?;
    for dependency in dependencies {
        if let Err(err) = computation.track_all(*dependency) {
            computation.dispose();
            return Err(err);
        }
    }

    Ok(Watcher { computation })
}

/// Run `callback` now and again whenever anything it read changes.
pub fn watch_effect<F>(runtime: &Runtime, callback: F) -> Result<Watcher>
where
    F: Fn() + Send + Sync + 'static,
{
    let options = ComputationOptions::default().immediate();
    let computation = Computation::new(runtime, callback, options)?;
    Ok(Watcher { computation })
}

impl Runtime {
    /// See [`watch`].
    pub fn watch<F>(
        &self,
        dependencies: &[&dyn Source],
        callback: F,
        options: WatchOptions,
    ) -> Result<Watcher>
    where
        F: Fn() + Send + Sync + 'static,
    {
        watch(self, dependencies, callback, options)
    }

    /// See [`watch_effect`].
    pub fn watch_effect<F>(&self, callback: F) -> Result<Watcher>
    where
        F: Fn() + Send + Sync + 'static,
    {
        watch_effect(self, callback)
    }
}
