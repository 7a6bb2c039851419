pub mod core;
pub mod policy;
pub mod serialize;
pub mod shell;

// Shell command checking built on the grammar analyzer
pub mod permissions;

pub use core::{GuardError, GuardResult, ShellParseError, ToolCall};
pub use permissions::{
    check_command_permissions, is_command_allowed, CommandAllowance, PermissionCheckResult,
    SessionAllowlist, ShellPermissionConfig,
};
pub use policy::{ApprovalMode, PolicyDecision, PolicyEngine, PolicyRule, PolicySettings};
pub use serialize::{stable_stringify, stable_stringify_with_hook, SerializeHook};
pub use shell::{
    command_roots, escape_shell_arg, get_command_roots, ShellDialect, SimpleCommand,
};
