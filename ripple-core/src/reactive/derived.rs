//! Derived Value Implementation
//!
//! A derived value is a computation built from a getter, evaluated once at
//! creation and re-run whenever anything it read changes. It is itself a
//! dependency through its `"value"` slot.
//!
//! # No Caching
//!
//! Unlike a memo, a derived value keeps no last result. Every `get` runs the
//! getter again, in the caller's context, so the caller ends up subscribed to
//! the derived value *and* to whatever the getter reads. Cost is proportional
//! to the getter on every access.
//!
//! # Propagation
//!
//! When an input changes, the runtime re-runs the getter and then re-runs
//! everything subscribed to the derived value's `"value"` slot. Explicit
//! watchers of a derived value therefore fire on input changes. A reader that
//! went through `get` is subscribed twice over (to the value and to the
//! inputs), and re-runs once per path.
//!
//! # Read-Write Form
//!
//! [`WritableDerived`] adds a setter. Writing calls the setter, then re-runs
//! the derived value's subscribers unconditionally. [`Derived`] has no `set`
//! at all, so writing a read-only derived value does not compile.

use std::fmt;

use super::computation::Computation;
use super::{ComputationId, ComputationOptions, DependencyId, Runtime, SlotKey, Source};
use crate::error::{BoxError, Result};

fn options() -> ComputationOptions {
    ComputationOptions::default().immediate().propagating()
}

/// A read-only derived value.
///
/// There is no way to write one, not even through its computation:
///
/// ```compile_fail
/// use ripple_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let answer = rt.derived(|| 42).unwrap();
/// answer.set(7).unwrap();
/// ```
///
/// ```compile_fail
/// use ripple_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let answer = rt.derived(|| 42).unwrap();
/// answer.computation().set(7).unwrap();
/// ```
pub struct Derived<T> {
    computation: Computation<T>,
}

impl<T> Derived<T>
where
    T: Send + 'static,
{
    pub fn new<F>(runtime: &Runtime, getter: F) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let computation = Computation::new(runtime, getter, options())?;
        Ok(Self { computation })
    }

    /// A derived value whose getter may fail.
    pub fn try_new<F, E>(runtime: &Runtime, getter: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let computation = Computation::try_new(runtime, getter, options())?;
        Ok(Self { computation })
    }
}

impl<T> Derived<T> {
    /// Evaluate the getter, subscribing the caller.
    pub fn get(&self) -> Result<T> {
        self.computation.get()
    }

    pub fn id(&self) -> ComputationId {
        self.computation.id()
    }

    pub fn dispose(&self) -> bool {
        self.computation.dispose()
    }

    pub fn is_alive(&self) -> bool {
        self.computation.is_alive()
    }

    /// Number of times the runtime has re-evaluated the getter.
    pub fn run_count(&self) -> u64 {
        self.computation.run_count()
    }

    /// Number of computations subscribed to this value.
    pub fn subscriber_count(&self) -> usize {
        self.computation.subscriber_count()
    }
}

/// A derived value with a setter.
pub struct WritableDerived<T> {
    computation: Computation<T>,
}

impl<T> WritableDerived<T>
where
    T: Send + 'static,
{
    pub fn new<F, S>(runtime: &Runtime, getter: F, setter: S) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        let computation = Computation::with_mutator(runtime, getter, setter, options())?;
        Ok(Self { computation })
    }
}

impl<T> WritableDerived<T> {
    pub fn get(&self) -> Result<T> {
        self.computation.get()
    }

    /// Call the setter, then re-run every subscriber of this value.
    pub fn set(&self, value: T) -> Result<()> {
        self.computation.set(value)
    }

    pub fn id(&self) -> ComputationId {
        self.computation.id()
    }

    pub fn computation(&self) -> &Computation<T> {
        &self.computation
    }

    pub fn dispose(&self) -> bool {
        self.computation.dispose()
    }
}

macro_rules! derived_common_impls {
    ($ty:ident) => {
        impl<T> Source for $ty<T> {
            fn runtime(&self) -> &Runtime {
                self.computation.runtime()
            }

            fn dependency_id(&self) -> DependencyId {
                Source::dependency_id(&self.computation)
            }

            fn slot_keys(&self) -> Vec<SlotKey> {
                vec![SlotKey::VALUE]
            }
        }

        impl<T> Clone for $ty<T> {
            fn clone(&self) -> Self {
                Self {
                    computation: self.computation.clone(),
                }
            }
        }

        impl<T> fmt::Debug for $ty<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("id", &self.computation.id())
                    .finish()
            }
        }
    };
}

derived_common_impls!(Derived);
derived_common_impls!(WritableDerived);

impl Runtime {
    /// Create a read-only [`Derived`] value.
    pub fn derived<T, F>(&self, getter: F) -> Result<Derived<T>>
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Derived::new(self, getter)
    }

    /// Create a read-only [`Derived`] value from a fallible getter.
    pub fn try_derived<T, F, E>(&self, getter: F) -> Result<Derived<T>>
    where
        T: Send + 'static,
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Derived::try_new(self, getter)
    }

    /// Create a [`WritableDerived`] value from a getter and a setter.
    pub fn writable_derived<T, F, S>(&self, getter: F, setter: S) -> Result<WritableDerived<T>>
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        WritableDerived::new(self, getter, setter)
    }
}
