//! End-to-end monitor behaviour.

use std::sync::{Arc, Barrier, Once};
use std::thread;

use callwatch::{
    CallHistory, ErrorPolicy, Monitor, MonitorConfig, MonitorError, MonitorFactory,
    PredicateRegistry,
};
use callwatch_core::{values, Function, ManualClock, Object, Value, UNSERIALIZABLE};
use proptest::prelude::*;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("CALLWATCH_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

fn factory() -> MonitorFactory {
    init_tracing();
    MonitorFactory::from_config(&MonitorConfig::default())
        .with_clock(Arc::new(ManualClock::default()))
        .with_registry(Arc::new(PredicateRegistry::with_builtins()))
}

fn add() -> Function {
    Function::named("add", |_, args| {
        let a = args.first().and_then(Value::as_f64).unwrap_or(0.0);
        let b = args.get(1).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(Value::from(a + b))
    })
}

// =============================================================================
// Recording
// =============================================================================

#[test]
fn test_wrapped_add_records_call() {
    let m = factory().wrap_function(add());
    assert_eq!(m.invoke(&values![10, 20]), Ok(Value::from(30)));

    let history = m.history();
    assert_eq!(history[0].args, values![10, 20]);
    assert_eq!(history[0].return_value, Value::from(30));
    assert_eq!(m.call_count(), 1);
    assert_eq!(m.last_return_value(), Some(Value::from(30)));
}

#[test]
fn test_explicit_receiver_is_recorded() {
    let m = factory().wrap_function(add());
    let ctx = Value::from(Object::with_properties([("name", "ctx")]));
    m.call(&ctx, &values![1, 2]).unwrap();
    assert!(m.history()[0].context.strict_equals(&ctx));
}

#[test]
fn test_thrown_error_is_recorded() {
    let err = Value::from(Object::with_properties([("message", "too many")]));
    let thrown = err.clone();
    let picky = Function::native(move |_, args| {
        if args.len() == 3 {
            Err(thrown.clone())
        } else {
            Ok(Value::Undefined)
        }
    });
    let m = factory().wrap_function(picky);

    assert_eq!(m.invoke(&values![10, 20, 30]), Ok(Value::Undefined));
    let first = m.first_call().unwrap();
    assert!(first.error.as_ref().is_some_and(|e| e.strict_equals(&err)));
    assert!(m.returned(&Value::Undefined));
    assert!(!m.returned(&err));
}

#[test]
fn test_noop_argument_queries() {
    let noop = factory().noop();
    noop.invoke(&values![10, 20, 30]).unwrap();
    assert!(noop.called_with_args(&values![20, 10]));
    assert!(noop.called_with_exact_args(&values![10, 20, 30]));
    assert!(!noop.called_with_exact_args(&values![30, 20, 10]));
}

#[test]
fn test_non_callable_is_rejected() {
    let result = factory().wrap_value(&Value::from(true));
    assert!(matches!(result, Err(MonitorError::InvalidArgument(_))));
}

#[test]
fn test_rethrow_policy_propagates() {
    let m = factory()
        .with_error_policy(ErrorPolicy::CaptureAndRethrow)
        .wrap_function(Function::native(|_, _| Err(Value::from("nope"))));
    assert_eq!(m.invoke(&[]), Err(Value::from("nope")));
    assert!(m.last_call().is_some_and(|r| r.threw()));
}

#[test]
fn test_snapshot_is_detached() {
    let m = factory().wrap_function(add());
    m.invoke(&values![1, 2]).unwrap();
    let snap = m.snapshot();
    m.invoke(&values![3, 4]).unwrap();
    assert_eq!(snap.call_count(), 1);
    assert_eq!(snap.last_return_value(), Some(Value::from(3)));
    assert_eq!(m.call_count(), 2);
}

#[test]
fn test_array_argument_matching() {
    let noop = factory().noop();
    let list = Value::from(values![1, 2]);
    noop.invoke(&[list.clone(), Value::from(3)]).unwrap();

    // array queries check each element
    assert!(noop.called_with(&list));
    assert!(noop.called_with(&Value::from(values![2, 3])));
    assert!(noop.called_with_exact_args(&[list, Value::from(3)]));
    assert!(!noop.called_with_exact_args(&[Value::from(values![1, 2]), Value::from(3)]));
}

#[test]
fn test_unserializable_arguments_do_not_fail_the_call() {
    let node = Object::new();
    node.set("next", node.clone());
    let m = factory().wrap_function(Function::native(|_, args| Ok(Value::from(args.len()))));

    assert_eq!(m.invoke(&[Value::from(node.clone())]), Ok(Value::from(1)));
    let record = m.first_call().unwrap();
    assert_eq!(record.args_serialized, UNSERIALIZABLE);
    assert!(record.arg(0).strict_equals(&Value::from(node.clone())));
    assert!(m.called_with(&Value::from(node.clone())));
    assert!(m.returned(&Value::from(1)));

    m.reset();
    node.remove("next");
}

// =============================================================================
// Method patching
// =============================================================================

#[test]
fn test_method_patch_lifecycle() {
    let counter = Object::with_properties([("count", 0)]);
    counter.set(
        "increment",
        Function::named("increment", |this, _| {
            let obj = this.as_object().cloned().ok_or(Value::from("no receiver"))?;
            let n = obj.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0) + 1.0;
            obj.set("count", n);
            Ok(Value::from(n))
        }),
    );

    let m = factory().wrap_method(&counter, "increment").unwrap();
    counter.call_method("increment", &[]).unwrap();
    counter.call_method("increment", &[]).unwrap();

    assert_eq!(m.call_count(), 2);
    assert!(m.returned(&Value::from(2)));
    assert_eq!(counter.get("count"), Some(Value::from(2)));
    assert_eq!(m.original().name(), "increment");

    assert!(m.restore());
    counter.call_method("increment", &[]).unwrap();
    assert_eq!(m.call_count(), 2);
    assert_eq!(counter.get("count"), Some(Value::from(3)));
}

#[test]
fn test_nested_monitors_restore_in_reverse_order() {
    let obj = Object::new();
    let original = Function::noop();
    obj.set("f", original.clone());

    let outer = factory().wrap_method(&obj, "f").unwrap();
    let inner = factory().wrap_method(&obj, "f").unwrap();
    obj.call_method("f", &values![1]).unwrap();
    assert_eq!(outer.call_count(), 1);
    assert_eq!(inner.call_count(), 1);

    assert!(inner.restore());
    assert!(outer.is(obj.get("f").unwrap().as_function().unwrap()));
    assert!(outer.restore());
    assert!(original.ptr_eq(obj.get("f").unwrap().as_function().unwrap()));
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_registered_predicate_visible_to_existing_monitors() {
    let registry = Arc::new(PredicateRegistry::with_builtins());
    let factory = factory().with_registry(Arc::clone(&registry));
    let m = factory.wrap_function(add());
    m.invoke(&values![1, 2]).unwrap();

    assert!(matches!(
        m.query("returned_more_than", &Value::from(2)),
        Err(MonitorError::UnknownPredicate(_))
    ));

    registry.register("returned_more_than", |records, bound| {
        let bound = bound.as_f64().unwrap_or(f64::INFINITY);
        records
            .iter()
            .any(|r| r.return_value.as_f64().is_some_and(|v| v > bound))
    });
    assert_eq!(m.query("returned_more_than", &Value::from(2)), Ok(true));
    assert_eq!(m.query("returned_more_than", &Value::from(3)), Ok(false));
}

#[test]
fn test_builtin_queries_by_name() {
    let m = factory().noop();
    m.invoke(&values![10, 20, 30]).unwrap();
    assert_eq!(m.query("called_with_args", &Value::from(values![20, 10])), Ok(true));
    assert_eq!(
        m.query("called_with_exact_args", &Value::from(values![30, 20, 10])),
        Ok(false)
    );
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_calls_have_dense_ordinals() {
    const THREADS: usize = 8;
    const CALLS: usize = 50;

    let m = factory().wrap_function(add());
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let m = m.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..CALLS {
                    m.invoke(&values![t, i]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history = m.history();
    assert_eq!(history.len(), THREADS * CALLS);
    assert_eq!(m.call_count(), THREADS * CALLS);
    for (i, record) in history.iter().enumerate() {
        assert_eq!(record.ordinal, i);
    }
}

#[test]
fn test_reset_is_atomic_under_concurrent_calls() {
    const THREADS: usize = 4;
    const CALLS: usize = 200;
    const RESETS: usize = 50;

    let m = factory().wrap_function(add());
    let barrier = Arc::new(Barrier::new(THREADS + 1));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let m = m.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..CALLS {
                    m.invoke(&values![t, i]).unwrap();
                }
            })
        })
        .collect();

    barrier.wait();
    for _ in 0..RESETS {
        m.reset();
        let snap = m.snapshot();
        assert_eq!(snap.call_count(), snap.history().len());
        assert_eq!(snap.called(), snap.call_count() > 0);
        assert_eq!(snap.last_return_value().is_some(), snap.called());
        for (i, record) in snap.records.iter().enumerate() {
            assert_eq!(record.ordinal, i);
        }
        thread::yield_now();
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let history = m.history();
    assert_eq!(m.call_count(), history.len());
    assert_eq!(m.called(), m.call_count() > 0);
    assert!(history.iter().enumerate().all(|(i, r)| r.ordinal == i));
}

#[test]
fn test_monitor_function_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Monitor>();
    assert_send_sync::<MonitorFactory>();
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_call_count_matches_invocations(calls in prop::collection::vec(-1000i32..1000, 0..40)) {
        let m = factory().noop();
        for n in &calls {
            m.invoke(&values![*n]).unwrap();
        }
        prop_assert_eq!(m.call_count(), calls.len());
        prop_assert_eq!(m.called(), !calls.is_empty());
        for (i, n) in calls.iter().enumerate() {
            let record = m.nth_call(i).unwrap();
            prop_assert_eq!(record.ordinal, i);
            prop_assert_eq!(record.arg(0), &Value::from(*n));
        }
    }

    #[test]
    fn prop_reset_restarts_history(before in 0usize..20, after in 0usize..20) {
        let m = factory().noop();
        for _ in 0..before {
            m.invoke(&[]).unwrap();
        }
        m.reset();
        prop_assert_eq!(m.call_count(), 0);
        prop_assert_eq!(m.last_return_value(), None);
        for _ in 0..after {
            m.invoke(&[]).unwrap();
        }
        prop_assert_eq!(m.call_count(), after);
        prop_assert!(m.history().iter().enumerate().all(|(i, r)| r.ordinal == i));
    }

    #[test]
    fn prop_exact_args_accepts_what_was_passed(args in prop::collection::vec(any::<i32>(), 0..8)) {
        let m = factory().noop();
        let values: Vec<Value> = args.iter().copied().map(Value::from).collect();
        m.invoke(&values).unwrap();
        prop_assert!(m.called_with_exact_args(&values));
        prop_assert!(m.called_with_args(&values));
    }
}
