//! Host-configuration to rule-set mapping
//!
//! Translates the approval-mode enum and the allowed/excluded tool lists a
//! host supplies into a concrete [`PolicyEngine`], using fixed priority
//! bands so the precedence is auditable:
//!
//! - 100: exclusions and the global shell-disable (Deny)
//! - 50: explicitly allowed tools / exact sub-commands (Allow)
//! - 10: approval-mode defaults
//!
//! This layer sits above the engine; the engine itself never consults
//! host configuration.

use serde::{Deserialize, Serialize};

use crate::core::GuardResult;

use super::engine::PolicyEngine;
use super::rule::{ArgsPattern, PolicyDecision, PolicyRule};

/// Priority of exclusion rules and the shell-disable rule
const PRIORITY_EXCLUDE: i32 = 100;
/// Priority of explicit allowances
const PRIORITY_ALLOW: i32 = 50;
/// Priority of approval-mode default rules
const PRIORITY_MODE: i32 = 10;

/// Tools that only observe the workspace
const READ_ONLY_TOOLS: &[&str] = &[
    "read_file",
    "read_many_files",
    "list_directory",
    "glob",
    "search_file_content",
];

/// Tools that modify files but nothing else
const EDIT_TOOLS: &[&str] = &["edit", "replace", "write_file"];

/// How eagerly the agent may act without confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Prompt for everything not explicitly allowed
    #[default]
    Default,
    /// Auto-accept read-only and file-editing tools
    AutoEdit,
    /// Allow everything
    Yolo,
}

/// Host-supplied authorization settings.
///
/// `allowed_tools` entries are either a bare tool name (`"web_fetch"`) or a
/// tool scoped to one exact sub-command (`"run_shell_command(git status)"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Approval mode governing the default rules
    pub approval_mode: ApprovalMode,
    /// Tools (or exact sub-commands) that never prompt
    pub allowed_tools: Vec<String>,
    /// Tools that must never run; beats every allowance
    pub excluded_tools: Vec<String>,
    /// Disable the shell tool entirely
    pub shell_disabled: bool,
    /// Name the shell tool registers under
    pub shell_tool_name: String,
    /// Coerce AskUser to Deny (unattended runs)
    pub non_interactive: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            approval_mode: ApprovalMode::Default,
            allowed_tools: Vec::new(),
            excluded_tools: Vec::new(),
            shell_disabled: false,
            shell_tool_name: "run_shell_command".to_string(),
            non_interactive: false,
        }
    }
}

impl PolicySettings {
    /// Compile these settings into a policy engine.
    ///
    /// Fails only if an allowed-tool entry produces an uncompilable
    /// argument pattern.
    pub fn compile(&self) -> GuardResult<PolicyEngine> {
        let mut engine = PolicyEngine::new(PolicyDecision::AskUser);

        for tool in &self.excluded_tools {
            engine.add_rule(
                PolicyRule::for_tool(tool, PolicyDecision::Deny).with_priority(PRIORITY_EXCLUDE),
            );
        }
        if self.shell_disabled {
            engine.add_rule(
                PolicyRule::for_tool(&self.shell_tool_name, PolicyDecision::Deny)
                    .with_priority(PRIORITY_EXCLUDE),
            );
        }

        for entry in &self.allowed_tools {
            engine.add_rule(allow_rule(entry)?.with_priority(PRIORITY_ALLOW));
        }

        match self.approval_mode {
            ApprovalMode::Default => {}
            ApprovalMode::AutoEdit => {
                for tool in READ_ONLY_TOOLS.iter().chain(EDIT_TOOLS) {
                    engine.add_rule(
                        PolicyRule::for_tool(*tool, PolicyDecision::Allow)
                            .with_priority(PRIORITY_MODE),
                    );
                }
            }
            ApprovalMode::Yolo => {
                engine
                    .add_rule(PolicyRule::new(PolicyDecision::Allow).with_priority(PRIORITY_MODE));
            }
        }

        engine.set_non_interactive(self.non_interactive);
        Ok(engine)
    }
}

/// Build the Allow rule for one `allowed_tools` entry.
///
/// `"tool(git status)"` becomes a rule for `tool` whose argument pattern
/// requires `"command":"git status"` in the stable serialization.
fn allow_rule(entry: &str) -> GuardResult<PolicyRule> {
    if let Some((tool, scoped)) = split_scoped_entry(entry) {
        let pattern = format!("\"command\":\"{}\"", regex::escape(scoped));
        return Ok(PolicyRule::for_tool(tool, PolicyDecision::Allow)
            .with_args_pattern(ArgsPattern::compile(&pattern)?));
    }
    Ok(PolicyRule::for_tool(entry, PolicyDecision::Allow))
}

/// Split `"tool(sub command)"` into `("tool", "sub command")`.
fn split_scoped_entry(entry: &str) -> Option<(&str, &str)> {
    let open = entry.find('(')?;
    let inner = entry[open..].strip_prefix('(')?.strip_suffix(')')?;
    if open == 0 || inner.is_empty() {
        return None;
    }
    Some((&entry[..open], inner))
}
