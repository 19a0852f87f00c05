//! Query predicates over call histories.
//!
//! All matching is by identity ([`Value::strict_equals`]): two distinct
//! arrays or objects with the same contents never match each other.
//!
//! Array queries are containment checks. Asking whether `[a, b]` was passed
//! means "were both `a` and `b` passed", recursively for nested arrays.

use std::borrow::Cow;

use callwatch_core::Value;

use crate::record::{CallRecord, HistorySnapshot};

/// Whether `needle` occurs in `haystack`.
///
/// An array needle is contained when every one of its elements is.
#[must_use]
pub fn contains(haystack: &[Value], needle: &Value) -> bool {
    match needle {
        Value::Array(items) => items.iter().all(|item| contains(haystack, item)),
        other => haystack.iter().any(|candidate| candidate.strict_equals(other)),
    }
}

/// Every argument of every record, with arrays expanded into their leaves.
#[must_use]
pub fn flatten_args(records: &[CallRecord]) -> Vec<Value> {
    let mut out = Vec::new();
    for record in records {
        flatten_into(&record.args, &mut out);
    }
    out
}

fn flatten_into(values: &[Value], out: &mut Vec<Value>) {
    for value in values {
        match value {
            Value::Array(items) => flatten_into(items, out),
            other => out.push(other.clone()),
        }
    }
}

/// Some record's return value is `value`.
///
/// A call that threw recorded `Undefined` as its return value.
#[must_use]
pub fn returned(records: &[CallRecord], value: &Value) -> bool {
    records.iter().any(|r| r.return_value.strict_equals(value))
}

/// Some call ran with `context` as its receiver.
#[must_use]
pub fn called_on(records: &[CallRecord], context: &Value) -> bool {
    records.iter().any(|r| r.context.strict_equals(context))
}

/// `value` was passed to any call.
///
/// Arguments of all calls are pooled, so an array query can be satisfied by
/// elements that were passed to different calls.
#[must_use]
pub fn called_with(records: &[CallRecord], value: &Value) -> bool {
    contains(&flatten_args(records), value)
}

/// A single call received all of `values`, in any order.
#[must_use]
pub fn called_with_args(records: &[CallRecord], values: &[Value]) -> bool {
    records
        .iter()
        .any(|r| values.iter().all(|v| contains(&r.args, v)))
}

/// A single call received exactly `values`, positionally.
#[must_use]
pub fn called_with_exact_args(records: &[CallRecord], values: &[Value]) -> bool {
    records.iter().any(|r| {
        r.args.len() == values.len()
            && r.args.iter().zip(values).all(|(a, b)| a.strict_equals(b))
    })
}

/// Read access to a call history, with the standard queries built on top.
///
/// Each provided method reads its own consistent view. Call
/// [`CallHistory::snapshot`] once to evaluate several questions against
/// the same state.
pub trait CallHistory {
    /// Records in call order.
    fn records(&self) -> Cow<'_, [CallRecord]>;

    /// Return value of the latest call; `None` before the first call.
    fn last_return_value(&self) -> Option<Value>;

    /// Records and last return value read together.
    fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            records: self.records().into_owned(),
            last_return: self.last_return_value(),
        }
    }

    /// Owned copy of the records.
    fn history(&self) -> Vec<CallRecord> {
        self.records().into_owned()
    }

    fn call_count(&self) -> usize {
        self.records().len()
    }

    fn called(&self) -> bool {
        self.call_count() > 0
    }

    /// The `n`th call (zero-based).
    fn nth_call(&self, n: usize) -> Option<CallRecord> {
        self.records().get(n).cloned()
    }

    fn first_call(&self) -> Option<CallRecord> {
        self.nth_call(0)
    }

    fn last_call(&self) -> Option<CallRecord> {
        self.records().last().cloned()
    }

    fn returned(&self, value: &Value) -> bool {
        returned(&self.records(), value)
    }

    fn called_on(&self, context: &Value) -> bool {
        called_on(&self.records(), context)
    }

    fn called_with(&self, value: &Value) -> bool {
        called_with(&self.records(), value)
    }

    fn called_with_args(&self, values: &[Value]) -> bool {
        called_with_args(&self.records(), values)
    }

    fn called_with_exact_args(&self, values: &[Value]) -> bool {
        called_with_exact_args(&self.records(), values)
    }
}

impl CallHistory for HistorySnapshot {
    fn records(&self) -> Cow<'_, [CallRecord]> {
        Cow::Borrowed(&self.records)
    }

    fn last_return_value(&self) -> Option<Value> {
        self.last_return.clone()
    }

    fn snapshot(&self) -> HistorySnapshot {
        self.clone()
    }
}
