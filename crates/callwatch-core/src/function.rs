//! Callable values.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Something that can be invoked with a receiver and positional arguments.
///
/// `Err` carries the value the callee threw.
pub trait Callable: Send + Sync {
    /// Invoke with `this` as receiver.
    fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "anonymous"
    }
}

struct NativeFn<F> {
    name: String,
    f: F,
}

impl<F> Callable for NativeFn<F>
where
    F: Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync,
{
    fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        (self.f)(this, args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Reference-counted handle to a [`Callable`].
///
/// Two handles are equal only when they share the same callable.
#[derive(Clone)]
pub struct Function(Arc<dyn Callable>);

impl Function {
    /// Wrap a callable implementation.
    pub fn new<C: Callable + 'static>(callable: C) -> Self {
        Self(Arc::new(callable))
    }

    /// Wrap an already shared callable, keeping its identity.
    #[must_use]
    pub fn from_arc(callable: Arc<dyn Callable>) -> Self {
        Self(callable)
    }

    /// Wrap a closure.
    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Self::named("anonymous", f)
    }

    /// Wrap a closure under a diagnostic name.
    pub fn named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Self::new(NativeFn {
            name: name.into(),
            f,
        })
    }

    /// A function that ignores its inputs and returns `Undefined`.
    #[must_use]
    pub fn noop() -> Self {
        Self::named("noop", |_, _| Ok(Value::Undefined))
    }

    /// Invoke the function.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        self.0.call(this, args)
    }

    /// Invoke with an `Undefined` receiver.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, Value> {
        self.0.call(&Value::Undefined, args)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Whether both handles share the same callable.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        // Compare data pointers only; vtable pointers may differ across codegen units.
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> Function {
        Function::named("add", |_, args| {
            let a = args.first().and_then(Value::as_f64).unwrap_or(0.0);
            let b = args.get(1).and_then(Value::as_f64).unwrap_or(0.0);
            Ok(Value::from(a + b))
        })
    }

    #[test]
    fn test_native_function_call() {
        let f = add();
        assert_eq!(f.invoke(&[Value::from(10), Value::from(20)]), Ok(Value::from(30)));
        assert_eq!(f.name(), "add");
    }

    #[test]
    fn test_function_receives_receiver() {
        let f = Function::native(|this, _| Ok(this.clone()));
        let ctx = Value::from("ctx");
        assert_eq!(f.call(&ctx, &[]), Ok(ctx));
    }

    #[test]
    fn test_function_throw() {
        let f = Function::native(|_, _| Err(Value::from("err")));
        assert_eq!(f.invoke(&[]), Err(Value::from("err")));
    }

    #[test]
    fn test_noop() {
        let f = Function::noop();
        assert_eq!(f.invoke(&[Value::from(1)]), Ok(Value::Undefined));
        assert_eq!(f.name(), "noop");
    }

    #[test]
    fn test_identity() {
        let f = add();
        let g = add();
        assert!(f.ptr_eq(&f.clone()));
        assert!(!f.ptr_eq(&g));
    }

    #[test]
    fn test_from_arc_keeps_identity() {
        let shared: Arc<dyn Callable> = Arc::new(NativeFn {
            name: "shared".to_string(),
            f: |_: &Value, _: &[Value]| -> Result<Value, Value> { Ok(Value::Null) },
        });
        let a = Function::from_arc(Arc::clone(&shared));
        let b = Function::from_arc(shared);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_debug_shows_name() {
        assert_eq!(format!("{:?}", add()), "Function(add)");
    }
}
