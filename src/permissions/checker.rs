//! Command permission checker
//!
//! Combines the shell grammar analyzer with configuration-level and
//! session-level allow/deny lists to classify a raw command. Hard
//! denials (explicit deny, global disable, unparseable input) are never
//! offerable as user-overridable prompts; soft denials (allow-list
//! absence in default-deny mode) are.

use serde::{Deserialize, Serialize};

use crate::shell::{grammar_for, ShellDialect, SimpleCommand};

use super::session::{normalize_command, SessionAllowlist};

/// Configuration-level shell allow/deny lists.
///
/// `allow` entries are either a command root (`git`) or an exact full
/// simple command (`git status`); `deny` entries are roots. `deny_all`
/// is the global shell-disable and overrides every allowance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellPermissionConfig {
    /// Roots or exact full commands that are pre-approved
    pub allow: Vec<String>,
    /// Roots that must never run
    pub deny: Vec<String>,
    /// Allow everything (deny entries still win)
    pub allow_all: bool,
    /// Deny everything; the global shell-disable
    pub deny_all: bool,
    /// Dialect to parse with; defaults to the host OS dialect
    pub dialect: Option<ShellDialect>,
}

impl ShellPermissionConfig {
    /// The dialect this configuration parses with
    pub fn dialect(&self) -> ShellDialect {
        self.dialect.unwrap_or_else(ShellDialect::host)
    }
}

/// Outcome of checking one raw command against the lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheckResult {
    /// Every simple command in the input is permitted
    pub all_allowed: bool,
    /// Source text of each blocked simple command
    pub disallowed_commands: Vec<String>,
    /// User-facing reason for the first block
    pub block_reason: Option<String>,
    /// True only for explicit-deny, global-disable, or unparseable
    /// input; never for plain allow-list absence
    pub is_hard_denial: bool,
}

impl PermissionCheckResult {
    fn allowed() -> Self {
        Self {
            all_allowed: true,
            disallowed_commands: Vec::new(),
            block_reason: None,
            is_hard_denial: false,
        }
    }

    fn hard(disallowed: Vec<String>, reason: String) -> Self {
        Self {
            all_allowed: false,
            disallowed_commands: disallowed,
            block_reason: Some(reason),
            is_hard_denial: true,
        }
    }
}

/// Simplified allow/deny answer for callers that only need a boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAllowance {
    /// Whether the command may run
    pub allowed: bool,
    /// Reason when it may not
    pub reason: Option<String>,
}

/// Classify a raw command against the configuration and, when present,
/// the session allow-list.
///
/// Without a session list the checker runs default-allow-unless-denied,
/// unless the global allow list itself is a strict list (non-empty,
/// without the allow-everything wildcard). With a session list, or a
/// strict global allow list, a command must be globally allowed or
/// session-approved to run; absence is a soft denial the user may
/// override. A deny match always wins and is always hard.
pub fn check_command_permissions(
    command: &str,
    config: &ShellPermissionConfig,
    session: Option<&SessionAllowlist>,
) -> PermissionCheckResult {
    let parsed = match grammar_for(config.dialect()).parse(command) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!("permission check: `{}` unparseable: {}", command, err);
            return PermissionCheckResult::hard(
                vec![command.trim().to_string()],
                format!("Command could not be parsed safely: {err}"),
            );
        }
    };

    if config.deny_all {
        tracing::debug!("permission check: shell globally disabled");
        return PermissionCheckResult::hard(
            vec![command.trim().to_string()],
            "Shell execution is disabled by configuration".to_string(),
        );
    }

    let default_deny = session.is_some() || (!config.allow_all && !config.allow.is_empty());
    // A verbatim approval of the whole input covers every simple command
    // in it; explicit deny entries still win
    let whole_input_approved = session.is_some_and(|list| list.contains(command));

    let mut disallowed = Vec::new();
    let mut reasons = Vec::new();
    let mut hard = false;

    for simple in &parsed {
        match classify(simple, config, session, default_deny, whole_input_approved) {
            Verdict::Permitted => {}
            Verdict::HardDenied => {
                disallowed.push(simple.text.clone());
                reasons.push(format!("'{}' is blocked by configuration", simple.root));
                hard = true;
            }
            Verdict::SoftDenied => {
                disallowed.push(simple.text.clone());
                reasons.push(format!(
                    "'{}' is not in the allowed commands list",
                    simple.root
                ));
            }
        }
    }

    if disallowed.is_empty() {
        return PermissionCheckResult::allowed();
    }
    tracing::debug!(
        "permission check: `{}` blocked (hard={}): {:?}",
        command,
        hard,
        disallowed
    );
    PermissionCheckResult {
        all_allowed: false,
        disallowed_commands: disallowed,
        block_reason: Some(reasons.join("; ")),
        is_hard_denial: hard,
    }
}

/// Convenience wrapper over [`check_command_permissions`] without a
/// session list.
pub fn is_command_allowed(command: &str, config: &ShellPermissionConfig) -> CommandAllowance {
    let result = check_command_permissions(command, config, None);
    CommandAllowance {
        allowed: result.all_allowed,
        reason: result.block_reason,
    }
}

enum Verdict {
    Permitted,
    HardDenied,
    SoftDenied,
}

fn classify(
    simple: &SimpleCommand,
    config: &ShellPermissionConfig,
    session: Option<&SessionAllowlist>,
    default_deny: bool,
    whole_input_approved: bool,
) -> Verdict {
    // Deny beats allow for the same root, and is always hard
    if config.deny.iter().any(|entry| entry == &simple.root) {
        return Verdict::HardDenied;
    }

    if !default_deny || whole_input_approved {
        return Verdict::Permitted;
    }

    let text = normalize_command(&simple.text);
    let globally_allowed = config.allow_all
        || config
            .allow
            .iter()
            .any(|entry| allow_entry_matches(entry, simple, &text));
    if globally_allowed {
        return Verdict::Permitted;
    }
    if session.is_some_and(|list| list.contains(&simple.text)) {
        return Verdict::Permitted;
    }
    Verdict::SoftDenied
}

/// An allow entry matches by root or by exact full simple command
fn allow_entry_matches(entry: &str, simple: &SimpleCommand, normalized_text: &str) -> bool {
    let entry = normalize_command(entry);
    entry == simple.root || entry == normalized_text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(allow: &[&str], deny: &[&str]) -> ShellPermissionConfig {
        ShellPermissionConfig {
            allow: allow.iter().map(|s| s.to_string()).collect(),
            deny: deny.iter().map(|s| s.to_string()).collect(),
            dialect: Some(ShellDialect::Posix),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_allow_without_lists() {
        let result = check_command_permissions("ls -la && cat f", &config(&[], &[]), None);
        assert!(result.all_allowed);
        assert!(result.block_reason.is_none());
    }

    #[test]
    fn test_global_deny_is_hard() {
        let cfg = config(&[], &["badCommand"]);
        let result = check_command_permissions("echo hello && badCommand --danger", &cfg, None);
        assert!(!result.all_allowed);
        assert_eq!(result.disallowed_commands, vec!["badCommand --danger"]);
        assert!(result.is_hard_denial);
    }

    #[test]
    fn test_strict_allow_list_absence_is_soft() {
        let cfg = config(&["goodCommand"], &[]);
        let result = check_command_permissions("badCommand --danger", &cfg, None);
        assert!(!result.all_allowed);
        assert!(!result.is_hard_denial);
        assert_eq!(result.disallowed_commands, vec!["badCommand --danger"]);
    }

    #[test]
    fn test_strict_allow_list_by_root() {
        let cfg = config(&["git"], &[]);
        assert!(check_command_permissions("git status", &cfg, None).all_allowed);
        assert!(check_command_permissions("git push --force", &cfg, None).all_allowed);
        assert!(!check_command_permissions("rm -rf /", &cfg, None).all_allowed);
    }

    #[test]
    fn test_strict_allow_list_by_exact_command() {
        let cfg = config(&["git status"], &[]);
        assert!(check_command_permissions("git status", &cfg, None).all_allowed);
        // Same root, different command: not covered by the exact entry
        let result = check_command_permissions("git push", &cfg, None);
        assert!(!result.all_allowed);
        assert!(!result.is_hard_denial);
    }

    #[test]
    fn test_unparseable_is_hard_and_whole_input() {
        let result = is_command_allowed("ls &&", &config(&[], &[]));
        assert!(!result.allowed);
        let reason = result.reason.unwrap();
        assert!(reason.contains("could not be parsed safely"), "{reason}");

        // Rejected as unparseable, not as root `ls`
        let full = check_command_permissions("ls &&", &config(&[], &["ls"]), None);
        assert_eq!(full.disallowed_commands, vec!["ls &&"]);
        assert!(full.is_hard_denial);
    }

    #[test]
    fn test_deny_all_overrides_everything() {
        let mut cfg = config(&["ls"], &[]);
        cfg.deny_all = true;
        cfg.allow_all = true;
        let result = check_command_permissions("ls", &cfg, None);
        assert!(!result.all_allowed);
        assert!(result.is_hard_denial);
        assert!(result
            .block_reason
            .unwrap()
            .contains("disabled by configuration"));
    }

    #[test]
    fn test_allow_all_permits_unlisted() {
        let mut cfg = config(&[], &["badCommand"]);
        cfg.allow_all = true;
        assert!(check_command_permissions("anything --at-all", &cfg, None).all_allowed);
        // Deny still beats the wildcard
        assert!(!check_command_permissions("badCommand", &cfg, None).all_allowed);
    }

    #[test]
    fn test_session_list_flips_to_default_deny() {
        let cfg = config(&[], &[]);
        let session = SessionAllowlist::new();
        let result = check_command_permissions("ls", &cfg, Some(&session));
        assert!(!result.all_allowed);
        assert!(!result.is_hard_denial);
    }

    #[test]
    fn test_session_approved_command_is_allowed() {
        let cfg = config(&[], &[]);
        let mut session = SessionAllowlist::new();
        session.approve("deploy.sh --prod");

        assert!(check_command_permissions("deploy.sh --prod", &cfg, Some(&session)).all_allowed);
        // Approval is verbatim; a different invocation stays blocked
        assert!(!check_command_permissions("deploy.sh --staging", &cfg, Some(&session)).all_allowed);
    }

    #[test]
    fn test_session_approved_compound_command() {
        let cfg = config(&[], &[]);
        let mut session = SessionAllowlist::new();
        session.approve("mkdir build && cd build");

        let result = check_command_permissions("mkdir build && cd build", &cfg, Some(&session));
        assert!(result.all_allowed);
        // Pieces of the approved compound are not individually approved
        assert!(!check_command_permissions("mkdir build", &cfg, Some(&session)).all_allowed);
    }

    #[test]
    fn test_global_deny_beats_whole_input_approval() {
        let cfg = config(&[], &["cd"]);
        let mut session = SessionAllowlist::new();
        session.approve("mkdir build && cd build");

        let result = check_command_permissions("mkdir build && cd build", &cfg, Some(&session));
        assert!(!result.all_allowed);
        assert!(result.is_hard_denial);
        assert_eq!(result.disallowed_commands, vec!["cd build"]);
    }

    #[test]
    fn test_global_deny_beats_session_approval() {
        let cfg = config(&[], &["deploy.sh"]);
        let mut session = SessionAllowlist::new();
        session.approve("deploy.sh --prod");

        let result = check_command_permissions("deploy.sh --prod", &cfg, Some(&session));
        assert!(!result.all_allowed);
        assert!(result.is_hard_denial);
    }

    #[test]
    fn test_global_allow_still_counts_with_session_list() {
        let cfg = config(&["git"], &[]);
        let session = SessionAllowlist::new();
        assert!(check_command_permissions("git status", &cfg, Some(&session)).all_allowed);
    }

    #[test]
    fn test_substitution_roots_are_checked() {
        let cfg = config(&[], &["badCommand"]);
        let result = check_command_permissions("echo $(badCommand --danger)", &cfg, None);
        assert!(!result.all_allowed);
        assert!(result.is_hard_denial);
        assert_eq!(result.disallowed_commands, vec!["badCommand --danger"]);
    }

    #[test]
    fn test_dynamic_command_word_is_hard_denied() {
        // The root actually executed is the substitution's output, so an
        // allow-list entry for the inner command must not help
        let cfg = config(&["echo"], &[]);
        let result = check_command_permissions("$(echo rm) -rf /", &cfg, None);
        assert!(!result.all_allowed);
        assert!(result.is_hard_denial);

        // Nor can a partially dynamic word dodge a deny entry
        let cfg = config(&[], &["git"]);
        let result = check_command_permissions("g$(echo it) status", &cfg, None);
        assert!(!result.all_allowed);
        assert!(result.is_hard_denial);
    }

    #[test]
    fn test_single_quoted_substitution_is_not_executed() {
        let cfg = config(&[], &["badCommand"]);
        assert!(check_command_permissions("echo '$(badCommand)'", &cfg, None).all_allowed);
    }

    #[test]
    fn test_mixed_hard_and_soft_is_hard() {
        let cfg = config(&["goodCommand"], &["badCommand"]);
        let result =
            check_command_permissions("otherCommand && badCommand", &cfg, None);
        assert!(!result.all_allowed);
        assert!(result.is_hard_denial);
        assert_eq!(
            result.disallowed_commands,
            vec!["otherCommand", "badCommand"]
        );
    }

    #[test]
    fn test_allowance_wrapper() {
        let cfg = config(&[], &["rm"]);
        let verdict = is_command_allowed("rm -rf /", &cfg);
        assert!(!verdict.allowed);
        assert!(verdict.reason.unwrap().contains("'rm' is blocked"));

        assert!(is_command_allowed("ls", &cfg).allowed);
    }
}
