//! Policy engine: ordered rule matching
//!
//! Rules are kept sorted descending by priority; equal priorities resolve
//! to the earlier-added rule. The engine is an explicit, constructible
//! object so independent policies (e.g. per sub-agent) coexist safely.

use std::cmp::Reverse;

use crate::core::ToolCall;

use super::rule::{PolicyDecision, PolicyRule};

/// Ordered rule set plus a default decision.
///
/// Evaluation is read-only; mutation (`add_rule`, `remove_rules_for_tool`)
/// must be serialized by the caller against concurrent reads.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    /// Sorted descending by priority, insertion order preserved on ties
    rules: Vec<PolicyRule>,
    default_decision: PolicyDecision,
    /// When set, any would-be AskUser is coerced to Deny just before
    /// returning. Fail-closed for unattended runs; rules are untouched.
    non_interactive: bool,
}

impl PolicyEngine {
    /// Create an engine with no rules and the given default decision
    pub fn new(default_decision: PolicyDecision) -> Self {
        Self {
            rules: Vec::new(),
            default_decision,
            non_interactive: false,
        }
    }

    /// Create an engine with initial rules
    pub fn with_rules(rules: Vec<PolicyRule>, default_decision: PolicyDecision) -> Self {
        let mut engine = Self::new(default_decision);
        engine.rules = rules;
        engine.sort_rules();
        engine
    }

    /// Set non-interactive mode
    pub fn set_non_interactive(&mut self, non_interactive: bool) {
        self.non_interactive = non_interactive;
    }

    /// Whether the engine coerces AskUser to Deny
    pub fn is_non_interactive(&self) -> bool {
        self.non_interactive
    }

    /// The decision for calls no rule matches
    pub fn default_decision(&self) -> PolicyDecision {
        self.default_decision
    }

    /// Render the decision for a candidate call.
    ///
    /// Total: every well-formed call yields exactly one decision, never an
    /// error.
    pub fn check(&self, call: &ToolCall) -> PolicyDecision {
        let decision = self
            .rules
            .iter()
            .find(|rule| rule.matches(call))
            .map(|rule| {
                tracing::debug!(
                    "policy: {} matched rule (tool={:?}, priority={}) -> {:?}",
                    call.name,
                    rule.tool_name,
                    rule.priority,
                    rule.decision
                );
                rule.decision
            })
            .unwrap_or_else(|| {
                tracing::debug!(
                    "policy: {} matched no rule -> default {:?}",
                    call.name,
                    self.default_decision
                );
                self.default_decision
            });

        if self.non_interactive && decision == PolicyDecision::AskUser {
            tracing::debug!("policy: non-interactive, coercing AskUser to Deny");
            return PolicyDecision::Deny;
        }
        decision
    }

    /// Add a rule and re-sort
    pub fn add_rule(&mut self, rule: PolicyRule) {
        tracing::info!(
            "policy: adding rule (tool={:?}, priority={}) -> {:?}",
            rule.tool_name,
            rule.priority,
            rule.decision
        );
        self.rules.push(rule);
        self.sort_rules();
    }

    /// Remove rules whose tool name is exactly `tool_name`. Wildcard rules
    /// and rules for other tools are unaffected.
    pub fn remove_rules_for_tool(&mut self, tool_name: &str) {
        let before = self.rules.len();
        self.rules
            .retain(|rule| rule.tool_name.as_deref() != Some(tool_name));
        let removed = before - self.rules.len();
        if removed > 0 {
            tracing::info!("policy: removed {} rule(s) for {}", removed, tool_name);
        }
    }

    /// Read-only snapshot of the rules in evaluation order
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Stable sort keeps insertion order among equal priorities, so the
    /// earlier-added rule wins ties.
    fn sort_rules(&mut self) {
        self.rules.sort_by_key(|rule| Reverse(rule.priority));
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(PolicyDecision::AskUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::rule::ArgsPattern;
    use serde_json::json;

    fn call(name: &str) -> ToolCall {
        ToolCall::new(name)
    }

    #[test]
    fn test_unmatched_call_gets_default() {
        let engine = PolicyEngine::new(PolicyDecision::AskUser);
        assert_eq!(engine.check(&call("anything")), PolicyDecision::AskUser);
    }

    #[test]
    fn test_highest_priority_wins() {
        let mut engine = PolicyEngine::new(PolicyDecision::AskUser);
        engine.add_rule(PolicyRule::for_tool("t", PolicyDecision::Deny).with_priority(1));
        engine.add_rule(PolicyRule::for_tool("t", PolicyDecision::Allow).with_priority(10));
        assert_eq!(engine.check(&call("t")), PolicyDecision::Allow);
    }

    #[test]
    fn test_equal_priority_earlier_added_wins() {
        let mut engine = PolicyEngine::new(PolicyDecision::AskUser);
        engine.add_rule(PolicyRule::for_tool("t", PolicyDecision::Deny).with_priority(3));
        engine.add_rule(PolicyRule::for_tool("t", PolicyDecision::Allow).with_priority(3));
        assert_eq!(engine.check(&call("t")), PolicyDecision::Deny);
    }

    #[test]
    fn test_match_all_deny_overridden_by_specific_allow() {
        let mut engine = PolicyEngine::new(PolicyDecision::AskUser);
        engine.add_rule(PolicyRule::new(PolicyDecision::Deny));
        engine.add_rule(PolicyRule::for_tool("read_file", PolicyDecision::Allow).with_priority(1));
        assert_eq!(engine.check(&call("read_file")), PolicyDecision::Allow);
        assert_eq!(engine.check(&call("write_file")), PolicyDecision::Deny);
    }

    #[test]
    fn test_non_interactive_never_asks() {
        let mut engine = PolicyEngine::new(PolicyDecision::AskUser);
        engine.add_rule(PolicyRule::for_tool("t", PolicyDecision::AskUser));
        engine.set_non_interactive(true);

        assert_eq!(engine.check(&call("t")), PolicyDecision::Deny);
        assert_eq!(engine.check(&call("other")), PolicyDecision::Deny);
        // Underlying rules are untouched
        assert_eq!(engine.rules()[0].decision, PolicyDecision::AskUser);
    }

    #[test]
    fn test_non_interactive_leaves_allow_alone() {
        let mut engine = PolicyEngine::new(PolicyDecision::Deny);
        engine.add_rule(PolicyRule::for_tool("t", PolicyDecision::Allow));
        engine.set_non_interactive(true);
        assert_eq!(engine.check(&call("t")), PolicyDecision::Allow);
    }

    #[test]
    fn test_remove_rules_for_tool_is_exact() {
        let mut engine = PolicyEngine::new(PolicyDecision::AskUser);
        engine.add_rule(PolicyRule::for_tool("srv__a", PolicyDecision::Allow));
        engine.add_rule(PolicyRule::for_tool("srv__*", PolicyDecision::Allow));
        engine.add_rule(PolicyRule::for_tool("other", PolicyDecision::Allow));

        engine.remove_rules_for_tool("srv__a");

        let names: Vec<_> = engine
            .rules()
            .iter()
            .map(|r| r.tool_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["srv__*", "other"]);
        // Wildcard still matches the removed exact name
        assert_eq!(engine.check(&call("srv__a")), PolicyDecision::Allow);
    }

    #[test]
    fn test_rules_snapshot_is_evaluation_order() {
        let mut engine = PolicyEngine::new(PolicyDecision::AskUser);
        engine.add_rule(PolicyRule::for_tool("low", PolicyDecision::Allow).with_priority(1));
        engine.add_rule(PolicyRule::for_tool("high", PolicyDecision::Allow).with_priority(9));
        let names: Vec<_> = engine
            .rules()
            .iter()
            .map(|r| r.tool_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["high", "low"]);
    }

    #[test]
    fn test_args_pattern_scopes_rule() {
        let mut engine = PolicyEngine::new(PolicyDecision::AskUser);
        engine.add_rule(
            PolicyRule::for_tool("run_shell_command", PolicyDecision::Allow)
                .with_args_pattern(ArgsPattern::compile(r#""command":"git status""#).unwrap())
                .with_priority(5),
        );

        let listed =
            ToolCall::new("run_shell_command").with_args(json!({"command": "git status"}));
        let other = ToolCall::new("run_shell_command").with_args(json!({"command": "rm -rf /"}));
        assert_eq!(engine.check(&listed), PolicyDecision::Allow);
        assert_eq!(engine.check(&other), PolicyDecision::AskUser);
    }
}
