//! Policy rules and decisions

use std::fmt;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::{GuardError, GuardResult, ToolCall};
use crate::serialize::stable_stringify;

/// Decision rendered for a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Execute without prompting
    Allow,
    /// Refuse to execute
    Deny,
    /// Suspend for a human confirmation
    AskUser,
}

/// Compiled text predicate over the stable serialization of a call's
/// arguments. Wraps the regex engine behind a small interface so the rule
/// model stays pattern-as-data.
#[derive(Debug, Clone)]
pub struct ArgsPattern {
    raw: String,
    regex: Regex,
}

impl ArgsPattern {
    /// Compile a pattern; invalid syntax is reported at rule-construction
    /// time, never during evaluation.
    pub fn compile(pattern: &str) -> GuardResult<Self> {
        let regex = Regex::new(pattern).map_err(|source| GuardError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    /// Test the predicate against serialized argument text
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// The original pattern text
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ArgsPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for ArgsPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ArgsPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ArgsPattern::compile(&raw).map_err(D::Error::custom)
    }
}

/// A match condition plus decision and priority.
///
/// `tool_name` is either an exact name, a `server__*` prefix wildcard, or
/// absent (matches every call). Immutable once added to an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Tool name condition; `None` matches all calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Predicate over the stable serialization of the call's arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_pattern: Option<ArgsPattern>,
    /// Decision rendered when this rule matches
    pub decision: PolicyDecision,
    /// Higher priority is consulted first; defaults to 0
    #[serde(default)]
    pub priority: i32,
}

impl PolicyRule {
    /// Create a match-all rule with the given decision
    pub fn new(decision: PolicyDecision) -> Self {
        Self {
            tool_name: None,
            args_pattern: None,
            decision,
            priority: 0,
        }
    }

    /// Create a rule scoped to a tool name (exact, or `server__*` wildcard)
    pub fn for_tool(tool_name: impl Into<String>, decision: PolicyDecision) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            args_pattern: None,
            decision,
            priority: 0,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the argument pattern
    pub fn with_args_pattern(mut self, pattern: ArgsPattern) -> Self {
        self.args_pattern = Some(pattern);
        self
    }

    /// Check whether this rule matches the given call
    pub fn matches(&self, call: &ToolCall) -> bool {
        if !self.matches_tool_name(&call.name) {
            return false;
        }
        match &self.args_pattern {
            None => true,
            Some(pattern) => {
                let args = call
                    .args
                    .clone()
                    .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
                pattern.matches(&stable_stringify(&args))
            }
        }
    }

    fn matches_tool_name(&self, name: &str) -> bool {
        match &self.tool_name {
            None => true,
            Some(condition) => {
                if let Some(prefix) = wildcard_prefix(condition) {
                    name.starts_with(prefix)
                } else {
                    name == condition
                }
            }
        }
    }
}

/// For a `server__*` condition, the `server__` prefix it matches on.
fn wildcard_prefix(condition: &str) -> Option<&str> {
    condition
        .strip_suffix('*')
        .filter(|prefix| prefix.ends_with("__"))
}
