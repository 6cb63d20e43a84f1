use serde::{Deserialize, Serialize};

/// The outcome of one script execution. Exactly one of `value` and `error`
/// is meaningful; `logs` always holds every captured console line in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Raw completion value. Absent when the script completes with `undefined`.
    pub value: Option<serde_json::Value>,
    pub display_text: Option<String>,
    pub logs: Vec<String>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(value: Option<serde_json::Value>, display_text: Option<String>, logs: Vec<String>) -> Self {
        ExecutionResult {
            value,
            display_text,
            logs,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, logs: Vec<String>) -> Self {
        ExecutionResult {
            value: None,
            display_text: None,
            logs,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
