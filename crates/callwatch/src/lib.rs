#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::use_self)]
//! Call-recording monitors.
//!
//! A [`Monitor`] wraps a function, forwards every call to it unchanged, and
//! keeps an ordered history of [`CallRecord`]s that tests can interrogate:
//!
//! - Counting: [`CallHistory::call_count`], [`CallHistory::called`]
//! - Positional access: [`CallHistory::nth_call`], [`CallHistory::first_call`],
//!   [`CallHistory::last_call`]
//! - Predicates: [`CallHistory::returned`], [`CallHistory::called_on`],
//!   [`CallHistory::called_with`], [`CallHistory::called_with_args`],
//!   [`CallHistory::called_with_exact_args`]
//! - Named, user-extensible predicates through [`Monitor::query`] and the
//!   [`PredicateRegistry`]
//!
//! Monitors can also replace a method on an [`Object`](callwatch_core::Object)
//! in place and later [`restore`](Monitor::restore) the original.
//!
//! # Example
//!
//! ```
//! use callwatch::{CallHistory, Monitor};
//! use callwatch_core::{values, Function, Object, Value};
//!
//! let calculator = Object::new();
//! calculator.set(
//!     "double",
//!     Function::native(|_, args| {
//!         let n = args.first().and_then(Value::as_f64).unwrap_or(0.0);
//!         Ok(Value::from(n * 2.0))
//!     }),
//! );
//!
//! let spy = Monitor::wrap_method(&calculator, "double").unwrap();
//! assert_eq!(calculator.call_method("double", &values![21]).unwrap(), Value::from(42));
//!
//! assert!(spy.called_with(&Value::from(21)));
//! assert!(spy.returned(&Value::from(42)));
//! assert!(spy.called_on(&Value::from(calculator.clone())));
//! assert!(spy.restore());
//! ```

pub mod config;
mod error;
pub mod monitor;
pub mod query;
mod record;
pub mod registry;

pub use callwatch_core;
pub use config::{ClockChoice, ErrorPolicy, MonitorConfig};
pub use error::{ConfigError, MonitorError};
pub use monitor::{Monitor, MonitorFactory};
pub use query::CallHistory;
pub use record::{CallRecord, HistorySnapshot};
pub use registry::{Predicate, PredicateRegistry};
