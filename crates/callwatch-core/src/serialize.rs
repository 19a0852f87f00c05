//! JSON rendering of argument lists for debugging output.
//!
//! Rendering never fails the caller: [`serialize_args`] degrades to
//! [`UNSERIALIZABLE`] when the values contain a cycle or are nested
//! deeper than [`MAX_SERIALIZE_DEPTH`].

use std::cell::RefCell;

use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::SerializeError;
use crate::value::Value;

/// Maximum nesting depth rendered before giving up.
pub const MAX_SERIALIZE_DEPTH: usize = 64;

/// Placeholder produced when arguments cannot be rendered.
pub const UNSERIALIZABLE: &str = "<unserializable>";

/// Largest integer a double represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Render arguments as a JSON array, degrading to [`UNSERIALIZABLE`].
#[must_use]
pub fn serialize_args(args: &[Value]) -> String {
    try_serialize_args(args).unwrap_or_else(|_| UNSERIALIZABLE.to_string())
}

/// Render arguments as a JSON array.
///
/// # Errors
///
/// Returns [`SerializeError::Cycle`] when an object contains itself and
/// [`SerializeError::TooDeep`] past [`MAX_SERIALIZE_DEPTH`].
pub fn try_serialize_args(args: &[Value]) -> Result<String, SerializeError> {
    let guard = Guard::default();
    let nodes: Vec<Node<'_>> = args
        .iter()
        .map(|value| Node {
            value,
            depth: 1,
            guard: &guard,
        })
        .collect();
    serde_json::to_string(&nodes).map_err(|e| {
        guard
            .failure
            .take()
            .unwrap_or_else(|| SerializeError::Json(e.to_string()))
    })
}

/// Render a single value as JSON.
///
/// # Errors
///
/// Same failure modes as [`try_serialize_args`].
pub fn try_serialize_value(value: &Value) -> Result<String, SerializeError> {
    let guard = Guard::default();
    let node = Node {
        value,
        depth: 1,
        guard: &guard,
    };
    serde_json::to_string(&node).map_err(|e| {
        guard
            .failure
            .take()
            .unwrap_or_else(|| SerializeError::Json(e.to_string()))
    })
}

#[derive(Default)]
struct Guard {
    /// Objects on the current path.
    visiting: RefCell<Vec<usize>>,
    failure: RefCell<Option<SerializeError>>,
}

impl Guard {
    fn fail<E: ser::Error>(&self, err: SerializeError) -> E {
        let msg = err.to_string();
        *self.failure.borrow_mut() = Some(err);
        E::custom(msg)
    }
}

struct Node<'a> {
    value: &'a Value,
    depth: usize,
    guard: &'a Guard,
}

impl<'a> Node<'a> {
    const fn child(&self, value: &'a Value) -> Self {
        Node {
            value,
            depth: self.depth + 1,
            guard: self.guard,
        }
    }
}

/// Properties without a JSON representation are dropped from objects.
const fn omitted_in_object(value: &Value) -> bool {
    matches!(value, Value::Undefined | Value::Function(_))
}

impl Serialize for Node<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.depth > MAX_SERIALIZE_DEPTH {
            return Err(self.guard.fail(SerializeError::TooDeep(MAX_SERIALIZE_DEPTH)));
        }

        match self.value {
            Value::Undefined | Value::Null | Value::Function(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
                    serializer.serialize_i64(*n as i64)
                } else {
                    // serde_json renders NaN and infinities as null
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Value::Object(obj) => {
                let addr = obj.addr();
                if self.guard.visiting.borrow().contains(&addr) {
                    return Err(self.guard.fail(SerializeError::Cycle));
                }
                // Copy out so no lock is held while descending.
                let entries: Vec<(String, Value)> = obj
                    .entries()
                    .into_iter()
                    .filter(|(_, v)| !omitted_in_object(v))
                    .collect();

                self.guard.visiting.borrow_mut().push(addr);
                let result = self.serialize_entries(serializer, &entries);
                self.guard.visiting.borrow_mut().pop();
                result
            }
        }
    }
}

impl Node<'_> {
    fn serialize_entries<S: Serializer>(
        &self,
        serializer: S,
        entries: &[(String, Value)],
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, &self.child(value))?;
        }
        map.end()
    }
}
