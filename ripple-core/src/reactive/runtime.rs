//! Reactive Runtime
//!
//! The runtime is the explicit reactivity context that connects cells,
//! reactive objects, derived values and watchers. It owns the
//! active-computation stack and the subscription registry, and every handle
//! it creates keeps a clone of it.
//!
//! # How It Works
//!
//! 1. When a computation evaluates, the runtime pushes it onto the stack.
//!
//! 2. When a cell (or any other dependency) is read, the runtime subscribes
//!    the top of the stack to the slot that was read.
//!
//! 3. When a slot is written, the runtime re-runs every subscriber of that
//!    slot in subscription order, synchronously and depth first. A write does
//!    not return until the whole cascade has finished.
//!
//! There is no batching, no deduplication and no topological ordering: in a
//! diamond-shaped graph the downstream computation re-runs once per path.
//!
//! # Thread Safety
//!
//! All state sits behind one re-entrant lock. A thread entering any reactive
//! operation holds it for the whole evaluation, nested triggers included, so
//! another thread can never observe (or push onto) the stack mid-evaluation.
//! The same thread may re-enter freely. Producers must not block on another
//! thread that is itself waiting to use the same runtime.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, trace, warn};

use super::context::{ActiveStack, EvaluationScope, Frame};
use super::registry::{ComputationEntry, Registry};
use super::{ComputationId, DependencyId, SlotKey};
use crate::config::{FailurePolicy, PruningPolicy, ReentrancyPolicy, RuntimeConfig};
use crate::error::{ReactiveError, Result};

/// Mutable state shared by everything a runtime manages.
#[derive(Default)]
pub(crate) struct State {
    pub(crate) stack: ActiveStack,
    pub(crate) registry: Registry,
}

struct RuntimeInner {
    id: u64,
    config: RuntimeConfig,
    state: ReentrantMutex<RefCell<State>>,
}

/// Handle to a reactivity context.
///
/// Cloning is cheap and yields a handle to the same context. Runtimes are
/// fully independent: subscriptions never cross from one to another.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            inner: Arc::new(RuntimeInner {
                id: COUNTER.fetch_add(1, Ordering::Relaxed),
                config,
                state: ReentrantMutex::new(RefCell::new(State::default())),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether two handles refer to the same context.
    pub fn same_runtime(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn ensure_same(&self, other: &Runtime) -> Result<()> {
        if self.same_runtime(other) {
            Ok(())
        } else {
            Err(ReactiveError::ForeignRuntime)
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// Run `f` with exclusive access to the runtime state.
    ///
    /// `f` must not call back into user code.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let guard = self.inner.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    /// Like [`with_state`](Self::with_state) but gives up instead of
    /// panicking when the state is already borrowed.
    pub(crate) fn try_with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> Option<R> {
        let guard = self.inner.state.lock();
        let mut state = guard.try_borrow_mut().ok()?;
        Some(f(&mut state))
    }

    /// Hold the runtime lock across a multi-step operation.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<State>> {
        self.inner.state.lock()
    }

    // ------------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------------

    /// Subscribe the active computation to `(dependency, slot)`.
    ///
    /// A no-op when nothing is evaluating, when the active computation does
    /// not track, or inside [`untracked`](Self::untracked).
    pub fn track(&self, dependency: DependencyId, slot: &SlotKey) {
        self.with_state(|state| {
            let Some(id) = state.stack.tracking_target() else {
                return;
            };
            match state.registry.subscribe(id, dependency, slot, false) {
                Ok(true) => trace!(
                    computation = id.raw(),
                    dependency = dependency.raw(),
                    %slot,
                    "tracked"
                ),
                Ok(false) => {}
                // The computation disposed itself mid-run.
                Err(_) => trace!(computation = id.raw(), "track on disposed computation"),
            }
        });
    }

    /// Explicitly subscribe `computation` to `(dependency, slot)`.
    ///
    /// Explicit subscriptions ignore the computation's tracking flag and are
    /// never pruned.
    pub fn track_with(
        &self,
        computation: ComputationId,
        dependency: DependencyId,
        slot: &SlotKey,
    ) -> Result<()> {
        let created = self.with_state(|state| {
            state.registry.subscribe(computation, dependency, slot, true)
        })?;
        if created {
            trace!(
                computation = computation.raw(),
                dependency = dependency.raw(),
                %slot,
                "subscribed"
            );
        }
        Ok(())
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn untrack(
        &self,
        computation: ComputationId,
        dependency: DependencyId,
        slot: &SlotKey,
    ) -> bool {
        self.with_state(|state| state.registry.unsubscribe(computation, dependency, slot))
    }

    /// Evaluate `f` with tracking suspended.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _gate = self.lock();
        let _scope = EvaluationScope::enter(self, Frame::Untracked);
        f()
    }

    // ------------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------------

    /// Re-run every subscriber of `(dependency, slot)`.
    ///
    /// Subscribers run in subscription order on the calling thread. The set is
    /// snapshotted up front: computations subscribed during the fan-out wait
    /// for the next write, and computations disposed during it are skipped.
    pub fn trigger(&self, dependency: DependencyId, slot: &SlotKey) -> Result<()> {
        let _gate = self.lock();
        let subscribers = self.with_state(|state| state.registry.subscribers_of(dependency, slot));
        if subscribers.is_empty() {
            return Ok(());
        }

        debug!(
            dependency = dependency.raw(),
            %slot,
            subscribers = subscribers.len(),
            "trigger"
        );

        let mut failures = Vec::new();
        for id in subscribers {
            if let Err(err) = self.run(id) {
                match self.inner.config.failure_policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Continue => {
                        warn!(computation = id.raw(), error = %err, "subscriber failed");
                        failures.push(err);
                    }
                }
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(ReactiveError::Multiple(failures)),
        }
    }

    /// Re-evaluate a registered computation with itself on top of the stack.
    ///
    /// A computation built to propagate then re-runs the subscribers of its
    /// own `"value"` slot.
    pub(crate) fn run(&self, id: ComputationId) -> Result<()> {
        self.evaluate(id, false)
    }

    /// First evaluation at construction. Never propagates.
    pub(crate) fn run_initial(&self, id: ComputationId) -> Result<()> {
        self.evaluate(id, true)
    }

    fn evaluate(&self, id: ComputationId, initial: bool) -> Result<()> {
        let _gate = self.lock();
        let reentrancy = self.inner.config.reentrancy;

        let prepared = self.with_state(|state| {
            let nested = state.stack.contains(id);
            if nested {
                match reentrancy {
                    ReentrancyPolicy::Skip => {
                        debug!(computation = id.raw(), "skipping re-entrant trigger");
                        return Ok(None);
                    }
                    ReentrancyPolicy::Error => return Err(ReactiveError::Reentrant(id)),
                    ReentrancyPolicy::Allow => {}
                }
            }
            Ok(state.registry.begin_run(id).map(|ticket| (ticket, nested)))
        })?;

        let Some((ticket, nested)) = prepared else {
            return Ok(());
        };

        let result = {
            let _scope = EvaluationScope::enter(
                self,
                Frame::Computation {
                    id,
                    tracking: ticket.tracking,
                },
            );
            (ticket.runner)()
        };

        // Edges read by a nested run carry a later epoch and survive.
        let prune = result.is_ok()
            && !nested
            && ticket.tracking
            && self.inner.config.pruning == PruningPolicy::Prune;
        if prune {
            let stale = self.with_state(|state| state.registry.prune(id, ticket.epoch));
            for (dependency, slot) in &stale {
                trace!(
                    computation = id.raw(),
                    dependency = dependency.raw(),
                    %slot,
                    "pruned"
                );
            }
        }

        result?;
        if ticket.propagate && !initial {
            trace!(computation = id.raw(), "propagating re-run");
            self.trigger(ticket.output, &SlotKey::VALUE)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lifetime
    // ------------------------------------------------------------------------

    pub(crate) fn register(&self, id: ComputationId, entry: ComputationEntry) {
        if let Some(name) = &entry.name {
            debug!(computation = id.raw(), %name, "registered");
        }
        self.with_state(|state| state.registry.insert(id, entry));
    }

    /// Remove a computation and all of its subscriptions.
    ///
    /// Returns `false` if it was already gone. Computations subscribed to the
    /// disposed computation's value lose that subscription.
    pub fn dispose(&self, computation: ComputationId) -> bool {
        let removed = self.with_state(|state| state.registry.remove(computation));
        let found = removed.is_some();
        if found {
            debug!(computation = computation.raw(), "disposed");
        }
        // Dropped here, after the state borrow, so captured handles can
        // release their own registry entries.
        drop(removed);
        found
    }

    /// Forget every subscription to `dependency`.
    pub fn release(&self, dependency: DependencyId) -> usize {
        self.with_state(|state| state.registry.release_dependency(dependency))
    }

    pub(crate) fn release_on_drop(&self, dependency: DependencyId) {
        let released = self.try_with_state(|state| state.registry.release_dependency(dependency));
        if let Some(edges) = released.filter(|edges| *edges > 0) {
            trace!(dependency = dependency.raw(), edges, "released");
        }
    }

    /// Dispose every computation and subscription.
    pub fn teardown(&self) {
        let entries = self.with_state(|state| state.registry.drain());
        debug!(computations = entries.len(), "teardown");
        drop(entries);
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// The innermost computation currently evaluating, if any.
    ///
    /// Still reported inside [`untracked`](Self::untracked), even though
    /// reads there subscribe nothing.
    pub fn active_computation(&self) -> Option<ComputationId> {
        self.with_state(|state| state.stack.current())
    }

    pub fn is_alive(&self, computation: ComputationId) -> bool {
        self.with_state(|state| state.registry.contains(computation))
    }

    pub fn computation_count(&self) -> usize {
        self.with_state(|state| state.registry.computations().count())
    }

    /// Number of times the computation has been evaluated by the runtime.
    ///
    /// Direct reads through `get` are not counted.
    pub fn run_count(&self, computation: ComputationId) -> u64 {
        self.with_state(|state| state.registry.entry(computation).map_or(0, |e| e.runs))
    }

    /// Number of `(dependency, slot)` pairs the computation is subscribed to.
    pub fn dependency_count(&self, computation: ComputationId) -> usize {
        self.with_state(|state| {
            state
                .registry
                .entry(computation)
                .map_or(0, ComputationEntry::dependency_count)
        })
    }

    pub fn subscriber_count(&self, dependency: DependencyId, slot: &SlotKey) -> usize {
        self.with_state(|state| state.registry.subscriber_count(dependency, slot))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.try_with_state(|state| {
            (state.registry.computations().count(), state.stack.depth())
        });
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("computations", &counts.map(|(computations, _)| computations))
            .field("depth", &counts.map(|(_, depth)| depth))
            .finish()
    }
}
