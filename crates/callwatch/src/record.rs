//! Call records and history snapshots.

use std::time::Duration;

use callwatch_core::Value;

/// Immutable facts about one invocation of a monitored function.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Positional arguments, copied at call time.
    pub args: Vec<Value>,
    /// JSON rendering of `args`, for display only.
    pub args_serialized: String,
    /// What the function returned; `Undefined` when it threw.
    pub return_value: Value,
    /// What the function threw, if anything.
    pub error: Option<Value>,
    /// Wall-clock start of the call, in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Time spent inside the wrapped function.
    pub execution_time: Duration,
    /// Receiver the function ran with.
    pub context: Value,
    /// Zero-based position in the history since the last reset.
    pub ordinal: usize,
}

impl CallRecord {
    /// Whether the call threw.
    #[must_use]
    pub const fn threw(&self) -> bool {
        self.error.is_some()
    }

    /// The call's outcome as a `Result`.
    pub fn outcome(&self) -> Result<&Value, &Value> {
        match &self.error {
            Some(err) => Err(err),
            None => Ok(&self.return_value),
        }
    }

    /// Argument at `index`, `Undefined` when absent.
    #[must_use]
    pub fn arg(&self, index: usize) -> &Value {
        const UNDEFINED: &Value = &Value::Undefined;
        self.args.get(index).unwrap_or(UNDEFINED)
    }
}

/// Consistent point-in-time copy of a monitor's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    /// Records in call order.
    pub records: Vec<CallRecord>,
    /// Return value of the latest call; `None` before the first call.
    pub last_return: Option<Value>,
}
