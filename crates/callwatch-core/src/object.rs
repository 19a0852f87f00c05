//! Shared, mutable property maps.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::error::CallError;
use crate::value::Value;

type Properties = BTreeMap<String, Value>;

/// A record-like value whose properties can be read and replaced.
///
/// Cloning an `Object` clones the handle, not the properties. Two handles
/// are equal only when they refer to the same object.
#[derive(Clone, Default)]
pub struct Object(Arc<RwLock<Properties>>);

impl Object {
    /// Create an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object with initial properties.
    #[must_use]
    pub fn with_properties<K, V, I>(props: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = props
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self(Arc::new(RwLock::new(map)))
    }

    fn read(&self) -> RwLockReadGuard<'_, Properties> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Properties> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.read().get(name).cloned()
    }

    /// Assign a property, returning the previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.write().insert(name.into(), value.into())
    }

    /// Delete a property, returning its value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.write().remove(name)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Property names in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Copy of all properties in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether both handles point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address used for cycle detection.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Create a handle that does not keep the object alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Arc::downgrade(&self.0))
    }

    /// Invoke the function stored under `name` with this object as receiver.
    ///
    /// The property is resolved at call time, so a patched method is the
    /// one that runs. The property lock is released before the call.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::MissingProperty`] or [`CallError::NotCallable`]
    /// when the property cannot be invoked, and [`CallError::Thrown`] when
    /// the function itself throws.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        let property = self
            .get(name)
            .ok_or_else(|| CallError::MissingProperty(name.to_string()))?;
        let Value::Function(func) = property else {
            return Err(CallError::NotCallable {
                name: name.to_string(),
                found: property.type_name(),
            });
        };
        func.call(&Value::Object(self.clone()), args)
            .map_err(CallError::Thrown)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys only: property values may refer back to this object.
        f.debug_struct("Object")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Non-owning handle to an [`Object`].
#[derive(Clone, Default)]
pub struct WeakObject(Weak<RwLock<Properties>>);

impl WeakObject {
    /// Recover the object if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakObject")
    }
}
