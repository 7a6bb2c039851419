//! Shell command permissions
//!
//! Classifies a raw shell command against configuration-level and
//! session-level allow/deny lists:
//!
//! - **Hard denial**: explicit deny, global shell-disable, or
//!   unparseable input. Never offered as a user-overridable prompt.
//! - **Soft denial**: the command is syntactically valid but absent
//!   from the allow-list in default-deny mode. Collaborators may
//!   re-prompt and, on approval, add it to the [`SessionAllowlist`]
//!   and retry.
//!
//! Every simple command in the input (including those reached through
//! substitutions) must be permitted for the whole command to pass.

mod checker;
mod session;

pub use checker::{
    check_command_permissions, is_command_allowed, CommandAllowance, PermissionCheckResult,
    ShellPermissionConfig,
};
pub use session::SessionAllowlist;
