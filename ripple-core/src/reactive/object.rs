//! Reactive Object Wrapper
//!
//! A `ReactiveObject` is a per-property container: every key is its own slot,
//! so a computation that reads only `x` is not re-run when `y` changes.
//!
//! Properties are addressed explicitly through [`ReactiveObject::get`] and
//! [`ReactiveObject::set`] over a declared key set. Keys can be added later
//! with [`ReactiveObject::insert`]; reading or writing any other key is a
//! [`ReactiveError::UnknownSlot`].
//!
//! # Shallow Only
//!
//! Values are not wrapped recursively. If a property holds a shared handle
//! (an `Arc<Mutex<_>>`, say), mutating through that handle bypasses the
//! object and re-runs nobody. Only writes through the object propagate.

use std::fmt::{self, Debug};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{DependencyId, Runtime, SlotKey, Source};
use crate::error::{ReactiveError, Result};

struct ObjectInner<V> {
    id: DependencyId,
    runtime: Runtime,
    fields: RwLock<IndexMap<SlotKey, V>>,
}

impl<V> Drop for ObjectInner<V> {
    fn drop(&mut self) {
        self.runtime.release_on_drop(self.id);
    }
}

/// A map-backed reactive structure with one slot per property.
///
/// Clones are handles onto the same structure and share its subscriptions.
pub struct ReactiveObject<V> {
    inner: Arc<ObjectInner<V>>,
}

impl<V> ReactiveObject<V>
where
    V: Send + Sync + 'static,
{
    /// Wrap `fields`. Later duplicates of a key overwrite earlier ones.
    pub fn new<K, I>(runtime: &Runtime, fields: I) -> Self
    where
        K: Into<SlotKey>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            inner: Arc::new(ObjectInner {
                id: DependencyId::new(),
                runtime: runtime.clone(),
                fields: RwLock::new(fields),
            }),
        }
    }
}

impl<V> ReactiveObject<V> {
    pub fn id(&self) -> DependencyId {
        self.inner.id
    }

    fn unknown(&self, slot: SlotKey) -> ReactiveError {
        ReactiveError::UnknownSlot {
            dependency: self.inner.id,
            slot,
        }
    }

    /// Read one property, subscribing the active computation to it.
    ///
    /// The subscription is recorded even when the key is unknown, so a
    /// later [`insert`](Self::insert) of that key re-runs the reader.
    pub fn get(&self, key: impl Into<SlotKey>) -> Result<V>
    where
        V: Clone,
    {
        self.with(key, V::clone)
    }

    /// Borrow one property, subscribing the active computation to it.
    pub fn with<R>(&self, key: impl Into<SlotKey>, f: impl FnOnce(&V) -> R) -> Result<R> {
        let key = key.into();
        self.inner.runtime.track(self.inner.id, &key);
        let fields = self.inner.fields.read();
        fields
            .get(&key)
            .map(f)
            .ok_or_else(|| self.unknown(key.clone()))
    }

    /// Read one property without subscribing anything.
    pub fn get_untracked(&self, key: impl Into<SlotKey>) -> Result<V>
    where
        V: Clone,
    {
        let key = key.into();
        let value = self.inner.fields.read().get(&key).cloned();
        value.ok_or_else(|| self.unknown(key))
    }

    /// Write one declared property and re-run its subscribers.
    pub fn set(&self, key: impl Into<SlotKey>, value: V) -> Result<()> {
        let key = key.into();
        let _gate = self.inner.runtime.lock();
        match self.inner.fields.write().get_mut(&key) {
            Some(slot) => *slot = value,
            None => return Err(self.unknown(key)),
        }
        self.inner.runtime.trigger(self.inner.id, &key)
    }

    /// Write one declared property only if the value differs.
    ///
    /// Returns whether subscribers were re-run.
    pub fn set_if_changed(&self, key: impl Into<SlotKey>, value: V) -> Result<bool>
    where
        V: PartialEq,
    {
        let key = key.into();
        let _gate = self.inner.runtime.lock();
        match self.inner.fields.write().get_mut(&key) {
            Some(slot) if *slot == value => return Ok(false),
            Some(slot) => *slot = value,
            None => return Err(self.unknown(key)),
        }
        self.inner.runtime.trigger(self.inner.id, &key)?;
        Ok(true)
    }

    /// Compute a property's next value from its current one.
    ///
    /// The read and the write happen under one runtime lock.
    pub fn update(&self, key: impl Into<SlotKey>, f: impl FnOnce(&V) -> V) -> Result<()> {
        let key = key.into();
        let _gate = self.inner.runtime.lock();
        let next = {
            let fields = self.inner.fields.read();
            match fields.get(&key) {
                Some(value) => f(value),
                None => return Err(self.unknown(key)),
            }
        };
        self.set(key, next)
    }

    /// Declare (or overwrite) a property and re-run its subscribers.
    ///
    /// Watchers created before the key existed do not see it.
    pub fn insert(&self, key: impl Into<SlotKey>, value: V) -> Result<Option<V>> {
        let key = key.into();
        let _gate = self.inner.runtime.lock();
        let previous = self.inner.fields.write().insert(key.clone(), value);
        self.inner.runtime.trigger(self.inner.id, &key)?;
        Ok(previous)
    }

    /// The declared keys, in declaration order.
    pub fn keys(&self) -> Vec<SlotKey> {
        self.inner.fields.read().keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// Number of computations subscribed to one property.
    pub fn subscriber_count(&self, key: impl Into<SlotKey>) -> usize {
        self.inner.runtime.subscriber_count(self.inner.id, &key.into())
    }
}

impl ReactiveObject<Value> {
    /// Wrap the top-level properties of a JSON object.
    pub fn from_json(runtime: &Runtime, object: Map<String, Value>) -> Self {
        Self::new(runtime, object)
    }

    /// Wrap the fields of any `Serialize` struct.
    ///
    /// Fails with [`ReactiveError::NotAnObject`] if `value` does not
    /// serialize to a JSON object.
    pub fn from_serialize<T>(runtime: &Runtime, value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(value)? {
            Value::Object(object) => Ok(Self::from_json(runtime, object)),
            _ => Err(ReactiveError::NotAnObject),
        }
    }

    /// Current contents as a JSON object, without subscribing anything.
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .inner
            .fields
            .read()
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Value::Object(object)
    }

    /// Rebuild a struct from the current contents, subscribing the active
    /// computation to every property.
    pub fn deserialize<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        for key in self.keys() {
            self.inner.runtime.track(self.inner.id, &key);
        }
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl<V> Source for ReactiveObject<V> {
    fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    fn dependency_id(&self) -> DependencyId {
        self.inner.id
    }

    fn slot_keys(&self) -> Vec<SlotKey> {
        self.keys()
    }
}

impl<V> Clone for ReactiveObject<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Debug for ReactiveObject<V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("id", &self.inner.id)
            .field("fields", &*self.inner.fields.read())
            .finish()
    }
}

impl Runtime {
    /// Create a [`ReactiveObject`] owned by this runtime.
    pub fn reactive<K, V, I>(&self, fields: I) -> ReactiveObject<V>
    where
        K: Into<SlotKey>,
        V: Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
    {
        ReactiveObject::new(self, fields)
    }
}
