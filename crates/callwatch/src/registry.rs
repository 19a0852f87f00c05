//! Named, user-extensible query predicates.
//!
//! Every monitor evaluates [`Monitor::query`](crate::Monitor::query) against
//! the registry its factory was configured with. By default that is the
//! process-wide [`PredicateRegistry::global`], so a predicate registered
//! there becomes available on every monitor.
//!
//! # Example
//!
//! ```
//! use callwatch::{Monitor, PredicateRegistry};
//! use callwatch_core::Value;
//!
//! PredicateRegistry::global().register("called_times", |records, n| {
//!     n.as_f64() == Some(records.len() as f64)
//! });
//!
//! let m = Monitor::noop();
//! let _ = m.invoke(&[]);
//! assert_eq!(m.query("called_times", &Value::from(1)), Ok(true));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use callwatch_core::Value;
use tracing::debug;

use crate::error::MonitorError;
use crate::query;
use crate::record::CallRecord;

/// A named question about a call history.
pub type Predicate = Arc<dyn Fn(&[CallRecord], &Value) -> bool + Send + Sync>;

pub const RETURNED: &str = "returned";
pub const CALLED_ON: &str = "called_on";
pub const CALLED_WITH: &str = "called_with";
pub const CALLED_WITH_ARGS: &str = "called_with_args";
pub const CALLED_WITH_EXACT_ARGS: &str = "called_with_exact_args";

/// Interpret a query argument as a list: arrays spread, anything else is a
/// one-element list.
fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.to_vec(),
        other => vec![other.clone()],
    }
}

/// Table of predicates shared by the monitors that reference it.
pub struct PredicateRegistry {
    predicates: RwLock<BTreeMap<String, Predicate>>,
}

impl PredicateRegistry {
    /// Registry with no predicates.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            predicates: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry preloaded with the standard queries.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register(RETURNED, query::returned);
        registry.register(CALLED_ON, query::called_on);
        registry.register(CALLED_WITH, query::called_with);
        registry.register(CALLED_WITH_ARGS, |records, values| {
            query::called_with_args(records, &as_list(values))
        });
        registry.register(CALLED_WITH_EXACT_ARGS, |records, values| {
            query::called_with_exact_args(records, &as_list(values))
        });
        registry
    }

    /// Process-wide registry used by default factories.
    #[must_use]
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<PredicateRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Add or replace a predicate. Returns `true` if one was replaced.
    pub fn register<F>(&self, name: impl Into<String>, predicate: F) -> bool
    where
        F: Fn(&[CallRecord], &Value) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(predicate = %name, "registering predicate");
        self.predicates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(predicate))
            .is_some()
    }

    /// Remove a predicate. Returns `true` if it existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.predicates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.predicates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.predicates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Predicate> {
        self.predicates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Run a predicate over `records`.
    ///
    /// The table lock is released before the predicate runs, so predicates
    /// may themselves register or query.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::UnknownPredicate`] if `name` is not registered.
    pub fn evaluate(
        &self,
        name: &str,
        records: &[CallRecord],
        arg: &Value,
    ) -> Result<bool, MonitorError> {
        let predicate = self
            .get(name)
            .ok_or_else(|| MonitorError::UnknownPredicate(name.to_string()))?;
        Ok(predicate(records, arg))
    }
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("names", &self.names())
            .finish()
    }
}
