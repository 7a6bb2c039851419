//! Candidate tool call

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named action with an argument bag that the agent proposes to execute.
///
/// Ephemeral: built per check, never stored by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool being invoked
    pub name: String,
    /// Argument bag, if the call carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl ToolCall {
    /// Create a call with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
        }
    }

    /// Attach an argument bag
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }
}
