//! Error types for callwatch-core.

use thiserror::Error;

use crate::value::Value;

/// Errors raised when invoking a property of an [`Object`](crate::Object).
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// The object has no property with this name.
    #[error("property `{0}` does not exist")]
    MissingProperty(String),

    /// The property exists but does not hold a function.
    #[error("property `{name}` is not a function (found {found})")]
    NotCallable {
        /// Property name.
        name: String,
        /// Type name of the value found instead.
        found: &'static str,
    },

    /// The function ran and threw.
    #[error("call threw a {}", .0.type_name())]
    Thrown(Value),
}

impl CallError {
    /// The thrown value, if the call itself failed.
    #[must_use]
    pub fn thrown(&self) -> Option<&Value> {
        match self {
            Self::Thrown(value) => Some(value),
            _ => None,
        }
    }
}

/// Errors produced while serializing argument lists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    /// An object refers back to itself.
    #[error("cyclic structure cannot be serialized")]
    Cycle,

    /// Nesting exceeded the depth limit.
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    /// The JSON writer rejected the value.
    #[error("JSON error: {0}")]
    Json(String),
}
