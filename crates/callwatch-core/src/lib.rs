#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::use_self)]
#![allow(clippy::missing_const_for_fn)]
//! Core types for callwatch.
//!
//! This crate provides the foundation the monitor is built on:
//! - Dynamic values: [`Value`], [`Array`], [`Object`], [`Function`]
//! - The [`Callable`] trait that monitored functions implement
//! - Safe argument rendering: [`serialize_args`]
//! - Injectable time sources: [`Clock`] and its implementations

pub mod clock;
mod error;
mod function;
mod object;
pub mod serialize;
mod value;

pub use clock::{
    default_clock, probe_clock, Clock, ClockKind, ManualClock, MonotonicClock, Tick, WallClock,
};
pub use error::{CallError, SerializeError};
pub use function::{Callable, Function};
pub use object::{Object, WeakObject};
pub use serialize::{serialize_args, try_serialize_args, MAX_SERIALIZE_DEPTH, UNSERIALIZABLE};
pub use value::{Array, Value};
