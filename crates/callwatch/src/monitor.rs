//! Call-recording wrappers.
//!
//! A [`Monitor`] forwards every invocation to the function it wraps and
//! appends one [`CallRecord`] per call, whether the call returned or threw.
//! Monitors are built by a [`MonitorFactory`], which decides the clock,
//! the predicate registry and the [`ErrorPolicy`].

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use callwatch_core::{
    serialize_args, Callable, Clock, Function, Object, Value, WeakObject,
};
use tracing::{debug, trace};

use crate::config::{ErrorPolicy, MonitorConfig};
use crate::error::MonitorError;
use crate::query::CallHistory;
use crate::record::{CallRecord, HistorySnapshot};
use crate::registry::PredicateRegistry;

/// Builds monitors with a shared clock, registry and error policy.
#[derive(Debug, Clone)]
pub struct MonitorFactory {
    registry: Arc<PredicateRegistry>,
    clock: Arc<dyn Clock>,
    error_policy: ErrorPolicy,
    serialize_args: bool,
}

impl MonitorFactory {
    /// Factory using the global registry and the process configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(MonitorConfig::process_default())
    }

    /// Factory using the global registry and `config`.
    #[must_use]
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            registry: PredicateRegistry::global(),
            clock: config.clock.build(),
            error_policy: config.error_policy,
            serialize_args: config.serialize_args,
        }
    }

    /// Use a private predicate registry instead of the global one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PredicateRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Time calls with `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_serialize_args(mut self, enabled: bool) -> Self {
        self.serialize_args = enabled;
        self
    }

    #[must_use]
    pub const fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PredicateRegistry> {
        &self.registry
    }

    /// Monitor a no-op function.
    #[must_use]
    pub fn noop(&self) -> Monitor {
        self.build(Function::noop(), None)
    }

    /// Monitor `target`.
    #[must_use]
    pub fn wrap_function(&self, target: Function) -> Monitor {
        self.build(target, None)
    }

    /// Monitor a dynamically typed target.
    ///
    /// `Undefined` and `Null` stand for "no target" and produce a no-op
    /// monitor.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidArgument`] if `target` is any other
    /// non-function value.
    pub fn wrap_value(&self, target: &Value) -> Result<Monitor, MonitorError> {
        match target {
            Value::Function(f) => Ok(self.wrap_function(f.clone())),
            Value::Undefined | Value::Null => Ok(self.noop()),
            other => Err(MonitorError::InvalidArgument(format!(
                "must be a function, got {}",
                other.type_name()
            ))),
        }
    }

    /// Monitor `owner[name]` and install the monitor in its place.
    ///
    /// The installed function holds the monitor weakly, so `owner` never
    /// keeps the monitor or its history alive. Once the returned monitor is
    /// dropped, calls through the property go straight to the original.
    /// The monitor can [`Monitor::restore`] the original.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidArgument`] if the property is missing
    /// or not a function. `owner` is left untouched in that case.
    pub fn wrap_method(&self, owner: &Object, name: &str) -> Result<Monitor, MonitorError> {
        let original = owner.get(name).unwrap_or_default();
        let Value::Function(target) = &original else {
            return Err(MonitorError::InvalidArgument(format!(
                "property `{name}` must be a function, got {}",
                original.type_name()
            )));
        };

        let patch = RestoreHandle {
            owner: owner.downgrade(),
            property: name.to_string(),
            original: original.clone(),
            restored: AtomicBool::new(false),
        };
        let monitor = self.build(target.clone(), Some(patch));
        owner.set(name, monitor.as_function());
        debug!(property = name, "patched method with monitor");
        Ok(monitor)
    }

    fn build(&self, target: Function, patch: Option<RestoreHandle>) -> Monitor {
        debug!(
            function = target.name(),
            clock = %self.clock.kind(),
            policy = %self.error_policy,
            "monitor created"
        );
        let inner = Arc::new_cyclic(|weak: &Weak<MonitorInner>| MonitorInner {
            installed: patch.as_ref().map(|_| {
                Function::new(Forwarder {
                    monitor: weak.clone(),
                    original: target.clone(),
                })
            }),
            target,
            state: Mutex::new(MonitorState::default()),
            clock: Arc::clone(&self.clock),
            registry: Arc::clone(&self.registry),
            error_policy: self.error_policy,
            serialize_args: self.serialize_args,
            patch,
        });
        Monitor { inner }
    }
}

impl Default for MonitorFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Undo information for a patched method.
struct RestoreHandle {
    owner: WeakObject,
    property: String,
    original: Value,
    restored: AtomicBool,
}

impl RestoreHandle {
    fn restore(&self) -> bool {
        if self.restored.swap(true, Ordering::AcqRel) {
            return false;
        }
        let Some(owner) = self.owner.upgrade() else {
            return false;
        };
        owner.set(self.property.clone(), self.original.clone());
        debug!(property = %self.property, "restored original method");
        true
    }
}

/// Function installed on a patched owner.
///
/// Records through the monitor while it is alive, calls the original after.
struct Forwarder {
    monitor: Weak<MonitorInner>,
    original: Function,
}

impl Callable for Forwarder {
    fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        match self.monitor.upgrade() {
            Some(inner) => inner.capture(this, args),
            None => self.original.call(this, args),
        }
    }

    fn name(&self) -> &str {
        self.original.name()
    }
}

#[derive(Default)]
struct MonitorState {
    records: Vec<CallRecord>,
    last_return: Option<Value>,
}

struct MonitorInner {
    target: Function,
    /// Weak forwarder handed to the owner of a patched method.
    installed: Option<Function>,
    state: Mutex<MonitorState>,
    clock: Arc<dyn Clock>,
    registry: Arc<PredicateRegistry>,
    error_policy: ErrorPolicy,
    serialize_args: bool,
    patch: Option<RestoreHandle>,
}

impl MonitorInner {
    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn capture(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        let timestamp_ms = self.clock.epoch_millis();
        let start = self.clock.now();
        let outcome = self.target.call(this, args);
        let execution_time = self.clock.elapsed(start);

        let (return_value, error) = match &outcome {
            Ok(value) => (value.clone(), None),
            Err(thrown) => (Value::Undefined, Some(thrown.clone())),
        };
        let args_serialized = if self.serialize_args {
            serialize_args(args)
        } else {
            String::new()
        };

        let ordinal = {
            let mut state = self.state();
            let ordinal = state.records.len();
            state.last_return = Some(return_value.clone());
            state.records.push(CallRecord {
                args: args.to_vec(),
                args_serialized,
                return_value,
                error,
                timestamp_ms,
                execution_time,
                context: this.clone(),
                ordinal,
            });
            ordinal
        };

        match outcome {
            Ok(value) => {
                trace!(function = self.target.name(), ordinal, ?execution_time, "call recorded");
                Ok(value)
            }
            Err(thrown) => {
                trace!(
                    function = self.target.name(),
                    ordinal,
                    error = thrown.type_name(),
                    "call threw"
                );
                if self.error_policy.rethrows() {
                    Err(thrown)
                } else {
                    Ok(Value::Undefined)
                }
            }
        }
    }
}

impl Callable for MonitorInner {
    fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        self.capture(this, args)
    }

    fn name(&self) -> &str {
        self.target.name()
    }
}

/// A call-recording wrapper around a function.
///
/// Cloning a `Monitor` yields another handle to the same history.
///
/// # Example
///
/// ```
/// use callwatch::{CallHistory, Monitor};
/// use callwatch_core::{values, Function, Value};
///
/// let add = Function::native(|_, args| {
///     let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
///     Ok(Value::from(sum))
/// });
/// let m = Monitor::wrap_function(add);
/// assert_eq!(m.invoke(&values![10, 20]), Ok(Value::from(30)));
/// assert_eq!(m.call_count(), 1);
/// assert!(m.called_with_exact_args(&values![10, 20]));
/// ```
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

impl Monitor {
    /// Monitor `target` using a default [`MonitorFactory`].
    #[must_use]
    pub fn wrap_function(target: Function) -> Self {
        MonitorFactory::new().wrap_function(target)
    }

    /// See [`MonitorFactory::wrap_value`].
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidArgument`] for non-callable targets.
    pub fn wrap_value(target: &Value) -> Result<Self, MonitorError> {
        MonitorFactory::new().wrap_value(target)
    }

    /// See [`MonitorFactory::wrap_method`].
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidArgument`] if the property is not a function.
    pub fn wrap_method(owner: &Object, name: &str) -> Result<Self, MonitorError> {
        MonitorFactory::new().wrap_method(owner, name)
    }

    /// Monitor a no-op function using a default [`MonitorFactory`].
    #[must_use]
    pub fn noop() -> Self {
        MonitorFactory::new().noop()
    }

    /// Invoke the wrapped function with receiver `this` and record the call.
    ///
    /// # Errors
    ///
    /// Under [`ErrorPolicy::CaptureAndRethrow`], returns the value the wrapped
    /// function threw. Under [`ErrorPolicy::Capture`] this never fails.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        self.inner.capture(this, args)
    }

    /// Invoke with an `Undefined` receiver.
    ///
    /// # Errors
    ///
    /// Same as [`Monitor::call`].
    pub fn invoke(&self, args: &[Value]) -> Result<Value, Value> {
        self.inner.capture(&Value::Undefined, args)
    }

    /// This monitor as a [`Function`] value sharing its identity.
    ///
    /// For a patched method this is the function installed on the owner.
    #[must_use]
    pub fn as_function(&self) -> Function {
        if let Some(installed) = &self.inner.installed {
            return installed.clone();
        }
        let callable: Arc<dyn Callable> = self.inner.clone();
        Function::from_arc(callable)
    }

    /// Whether `f` is this monitor.
    #[must_use]
    pub fn is(&self, f: &Function) -> bool {
        self.as_function().ptr_eq(f)
    }

    /// The wrapped function.
    #[must_use]
    pub fn original(&self) -> &Function {
        &self.inner.target
    }

    #[must_use]
    pub fn error_policy(&self) -> ErrorPolicy {
        self.inner.error_policy
    }

    /// Records and last return value, read under one lock.
    #[must_use]
    pub fn snapshot(&self) -> HistorySnapshot {
        let state = self.inner.state();
        HistorySnapshot {
            records: state.records.clone(),
            last_return: state.last_return.clone(),
        }
    }

    /// Forget all calls. Does not undo a method patch.
    pub fn reset(&self) {
        let mut state = self.inner.state();
        let dropped = state.records.len();
        state.records.clear();
        state.last_return = None;
        drop(state);
        debug!(function = self.inner.target.name(), dropped, "monitor reset");
    }

    /// Put the original method back on its owner.
    ///
    /// Returns `true` only for the call that performed the restore. Monitors
    /// built from a plain function, repeat calls, and owners that have been
    /// dropped all return `false`. The monitor stays usable afterwards.
    pub fn restore(&self) -> bool {
        self.inner
            .patch
            .as_ref()
            .is_some_and(RestoreHandle::restore)
    }

    /// Whether this monitor patched a method.
    #[must_use]
    pub fn is_restorable(&self) -> bool {
        self.inner.patch.is_some()
    }

    /// Evaluate a registered predicate by name.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::UnknownPredicate`] if `name` is not registered.
    pub fn query(&self, name: &str, arg: &Value) -> Result<bool, MonitorError> {
        let records = self.inner.state().records.clone();
        self.inner.registry.evaluate(name, &records, arg)
    }
}

impl CallHistory for Monitor {
    fn records(&self) -> Cow<'_, [CallRecord]> {
        Cow::Owned(self.inner.state().records.clone())
    }

    fn last_return_value(&self) -> Option<Value> {
        self.inner.state().last_return.clone()
    }

    fn snapshot(&self) -> HistorySnapshot {
        Monitor::snapshot(self)
    }

    fn call_count(&self) -> usize {
        self.inner.state().records.len()
    }

    fn nth_call(&self, n: usize) -> Option<CallRecord> {
        self.inner.state().records.get(n).cloned()
    }

    fn last_call(&self) -> Option<CallRecord> {
        self.inner.state().records.last().cloned()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("function", &self.inner.target.name())
            .field("call_count", &self.inner.state().records.len())
            .field("error_policy", &self.inner.error_policy)
            .field("restorable", &self.is_restorable())
            .finish()
    }
}

impl From<&Monitor> for Value {
    fn from(monitor: &Monitor) -> Self {
        Self::Function(monitor.as_function())
    }
}
