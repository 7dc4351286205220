//! Computation Implementation
//!
//! A Computation is the generic reactive unit. Derived values and watchers
//! are both computations with particular options.
//!
//! # How Computations Work
//!
//! 1. When created, the computation registers with its runtime. If
//!    `run_immediately` is set, it evaluates its producer once with itself on
//!    top of the active stack, so every read subscribes it.
//!
//! 2. When any subscribed slot is written, the runtime re-runs the producer,
//!    again with the computation on top of the stack.
//!
//! 3. Reading [`Computation::get`] subscribes the *caller* to the
//!    computation's `"value"` slot and then invokes the producer in the
//!    caller's context. Nothing is cached: every read recomputes.
//!
//! 4. Writing [`Computation::set`] hands the value to the optional mutator and
//!    then re-runs everything subscribed to `"value"`.
//!
//! # Lifetime
//!
//! The runtime owns the producer. Dropping a `Computation` handle does not
//! stop it; call [`Computation::dispose`] (or [`Runtime::teardown`]).

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::registry::{ComputationEntry, Runner};
use super::{ComputationId, DependencyId, Runtime, SlotKey, Source};
use crate::error::{BoxError, ReactiveError, Result};

pub(crate) type Producer<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;
pub(crate) type Mutator<T> = Arc<dyn Fn(T) -> Result<()> + Send + Sync>;

/// Construction options for a [`Computation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputationOptions {
    /// Evaluate the producer once during construction.
    pub run_immediately: bool,
    /// Subscribe to whatever the producer reads. When `false`, only explicit
    /// [`Computation::track`] calls create subscriptions.
    pub track_dependencies: bool,
    /// Label attached to log events and graph snapshots.
    pub name: Option<Cow<'static, str>>,
    /// After every successful re-run (not the first run at construction),
    /// re-run the subscribers of this computation's `"value"` slot. Derived
    /// values set this so explicit watchers see their inputs change.
    pub propagate_reruns: bool,
}

impl Default for ComputationOptions {
    fn default() -> Self {
        Self {
            run_immediately: false,
            track_dependencies: true,
            name: None,
            propagate_reruns: false,
        }
    }
}

impl ComputationOptions {
    pub fn immediate(mut self) -> Self {
        self.run_immediately = true;
        self
    }

    pub fn untracked(mut self) -> Self {
        self.track_dependencies = false;
        self
    }

    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn propagating(mut self) -> Self {
        self.propagate_reruns = true;
        self
    }
}

/// A reactive unit wrapping a producer and an optional mutator.
pub struct Computation<T> {
    id: ComputationId,
    output: DependencyId,
    runtime: Runtime,
    producer: Producer<T>,
    mutator: Option<Mutator<T>>,
}

impl<T> Computation<T>
where
    T: Send + 'static,
{
    /// Create a computation from an infallible producer.
    pub fn new<F>(runtime: &Runtime, producer: F, options: ComputationOptions) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_parts(runtime, Arc::new(move || Ok(producer())), None, options)
    }

    /// Create a computation whose producer may fail.
    ///
    /// A failure during construction disposes the computation and is
    /// returned here; a failure during a later re-run is returned to the
    /// writer that triggered it.
    pub fn try_new<F, E>(
        runtime: &Runtime,
        producer: F,
        options: ComputationOptions,
    ) -> Result<Self>
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let producer = move || producer().map_err(ReactiveError::producer);
        Self::from_parts(runtime, Arc::new(producer), None, options)
    }

    /// Create a computation with a mutator invoked by [`set`](Self::set).
    pub fn with_mutator<F, M>(
        runtime: &Runtime,
        producer: F,
        mutator: M,
        options: ComputationOptions,
    ) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
        M: Fn(T) + Send + Sync + 'static,
    {
        let mutator: Mutator<T> = Arc::new(move |value| {
            mutator(value);
            Ok(())
        });
        Self::from_parts(runtime, Arc::new(move || Ok(producer())), Some(mutator), options)
    }

    pub(crate) fn from_parts(
        runtime: &Runtime,
        producer: Producer<T>,
        mutator: Option<Mutator<T>>,
        options: ComputationOptions,
    ) -> Result<Self> {
        let id = ComputationId::next();
        let output = DependencyId::new();

        let run_producer = Arc::clone(&producer);
        let runner: Runner = Arc::new(move || run_producer().map(drop));
        let mut entry =
            ComputationEntry::new(runner, options.track_dependencies, output, options.name);
        entry.propagate = options.propagate_reruns;
        runtime.register(id, entry);

        let computation = Self {
            id,
            output,
            runtime: runtime.clone(),
            producer,
            mutator,
        };

        if options.run_immediately {
            if let Err(err) = runtime.run_initial(id) {
                runtime.dispose(id);
                return Err(err);
            }
        }

        Ok(computation)
    }
}

impl<T> Computation<T> {
    pub fn id(&self) -> ComputationId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Subscribe the caller to `"value"`, then evaluate the producer.
    pub fn get(&self) -> Result<T> {
        let _gate = self.runtime.lock();
        self.runtime.track(self.output, &SlotKey::VALUE);
        (self.producer)()
    }

    /// Pass `value` to the mutator (if any), then re-run the subscribers of
    /// `"value"`. Subscribers run even without a mutator.
    pub fn set(&self, value: T) -> Result<()> {
        let _gate = self.runtime.lock();
        if let Some(mutator) = &self.mutator {
            mutator(value)?;
        }
        self.runtime.trigger(self.output, &SlotKey::VALUE)
    }

    /// Explicitly subscribe this computation to one slot.
    pub fn track(&self, dependency: DependencyId, slot: &SlotKey) -> Result<()> {
        self.runtime.track_with(self.id, dependency, slot)
    }

    /// Explicitly subscribe this computation to every slot of `source`.
    pub fn track_all(&self, source: &dyn Source) -> Result<()> {
        self.runtime.ensure_same(source.runtime())?;
        let dependency = source.dependency_id();
        for slot in source.slot_keys() {
            self.track(dependency, &slot)?;
        }
        Ok(())
    }

    /// Re-evaluate now, as if a dependency had changed.
    pub fn run(&self) -> Result<()> {
        if !self.runtime.is_alive(self.id) {
            return Err(ReactiveError::UnknownComputation(self.id));
        }
        self.runtime.run(self.id)
    }

    /// Stop reacting. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        self.runtime.dispose(self.id)
    }

    pub fn is_alive(&self) -> bool {
        self.runtime.is_alive(self.id)
    }

    pub fn run_count(&self) -> u64 {
        self.runtime.run_count(self.id)
    }

    pub fn dependency_count(&self) -> usize {
        self.runtime.dependency_count(self.id)
    }

    /// Number of computations subscribed to this computation's value.
    pub fn subscriber_count(&self) -> usize {
        self.runtime.subscriber_count(self.output, &SlotKey::VALUE)
    }
}

impl<T> Source for Computation<T> {
    fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    fn dependency_id(&self) -> DependencyId {
        self.output
    }

    fn slot_keys(&self) -> Vec<SlotKey> {
        vec![SlotKey::VALUE]
    }
}

impl<T> Clone for Computation<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            output: self.output,
            runtime: self.runtime.clone(),
            producer: Arc::clone(&self.producer),
            mutator: self.mutator.clone(),
        }
    }
}

impl<T> fmt::Debug for Computation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.id)
            .field("output", &self.output)
            .field("writable", &self.mutator.is_some())
            .finish()
    }
}

impl Runtime {
    /// Create a [`Computation`] from an infallible producer.
    pub fn computation<T, F>(
        &self,
        producer: F,
        options: ComputationOptions,
    ) -> Result<Computation<T>>
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Computation::new(self, producer, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FailurePolicy, RuntimeConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (count.clone(), count)
    }

    #[test]
    fn immediate_computation_runs_on_creation() {
        let rt = Runtime::new();
        let (count, count_clone) = counter();

        let computation = rt
            .computation(
                move || {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                },
                ComputationOptions::default().immediate(),
            )
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn lazy_computation_does_not_run_on_creation() {
        let rt = Runtime::new();
        let (count, count_clone) = counter();

        let computation = rt
            .computation(
                move || {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                },
                ComputationOptions::default(),
            )
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);

        computation.run().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn every_read_invokes_producer() {
        let rt = Runtime::new();
        let (count, count_clone) = counter();

        let computation = rt
            .computation(
                move || count_clone.fetch_add(1, Ordering::SeqCst) + 1,
                ComputationOptions::default(),
            )
            .unwrap();

        assert_eq!(computation.get().unwrap(), 1);
        assert_eq!(computation.get().unwrap(), 2);
        // Reads are not runtime evaluations.
        assert_eq!(computation.run_count(), 0);
    }

    #[test]
    fn set_without_mutator_still_triggers() {
        let rt = Runtime::new();
        let (count, count_clone) = counter();

        let source = rt.computation(|| 0, ComputationOptions::default()).unwrap();
        let reader = source.clone();
        let _consumer = rt
            .computation(
                move || {
                    reader.get().unwrap();
                    count_clone.fetch_add(1, Ordering::SeqCst);
                },
                ComputationOptions::default().immediate(),
            )
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        source.set(7).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mutator_receives_written_value() {
        let rt = Runtime::new();
        let (seen, seen_clone) = counter();

        let computation = Computation::with_mutator(
            &rt,
            || 0usize,
            move |value| seen_clone.store(value, Ordering::SeqCst),
            ComputationOptions::default(),
        )
        .unwrap();

        computation.set(41).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 41);
    }

    #[test]
    fn failing_construction_disposes() {
        let rt = Runtime::new();

        let result = Computation::<()>::try_new(
            &rt,
            || Err::<(), _>("boom"),
            ComputationOptions::default().immediate(),
        );

        assert!(matches!(result, Err(ReactiveError::Producer(_))));
        assert_eq!(rt.computation_count(), 0);
    }

    #[test]
    fn failure_aborts_remaining_subscribers() {
        let rt = Runtime::new();
        let (count, count_clone) = counter();
        let source = rt.computation(|| (), ComputationOptions::default()).unwrap();

        let failing =
            Computation::<()>::try_new(&rt, || Err::<(), _>("boom"), ComputationOptions::default())
                .unwrap();
        failing.track_all(&source).unwrap();

        let after = rt
            .computation(
                move || {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                },
                ComputationOptions::default(),
            )
            .unwrap();
        after.track_all(&source).unwrap();

        assert!(source.set(()).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn continue_policy_runs_everyone_and_reports() {
        let rt = Runtime::with_config(
            RuntimeConfig::default().with_failure_policy(FailurePolicy::Continue),
        );
        let (count, count_clone) = counter();
        let source = rt.computation(|| (), ComputationOptions::default()).unwrap();

        for _ in 0..2 {
            let failing = Computation::<()>::try_new(
                &rt,
                || Err::<(), _>("boom"),
                ComputationOptions::default(),
            )
            .unwrap();
            failing.track_all(&source).unwrap();
        }
        let after = rt
            .computation(
                move || {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                },
                ComputationOptions::default(),
            )
            .unwrap();
        after.track_all(&source).unwrap();

        let err = source.set(()).unwrap_err();
        assert!(matches!(err, ReactiveError::Multiple(ref failures) if failures.len() == 2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_after_dispose_is_an_error() {
        let rt = Runtime::new();
        let computation = rt.computation(|| (), ComputationOptions::default()).unwrap();

        assert!(computation.dispose());
        assert!(!computation.is_alive());
        assert!(matches!(
            computation.run(),
            Err(ReactiveError::UnknownComputation(_))
        ));
        assert!(computation.track(DependencyId::new(), &SlotKey::VALUE).is_err());
    }

    #[test]
    fn foreign_source_is_rejected() {
        let rt = Runtime::new();
        let other = Runtime::new();
        let computation = rt.computation(|| (), ComputationOptions::default()).unwrap();
        let foreign = other.computation(|| (), ComputationOptions::default()).unwrap();

        assert!(matches!(
            computation.track_all(&foreign),
            Err(ReactiveError::ForeignRuntime)
        ));
    }
}
