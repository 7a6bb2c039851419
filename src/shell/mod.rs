//! Shell grammar analysis and escaping
//!
//! Given a raw command line and a dialect, the analyzer determines exactly
//! which external programs the command would invoke, regardless of
//! metacharacters, nesting, or substitutions:
//!
//! - Sequencing and pipe operators (`;`, `&&`, `||`, `&`, `|`) split the
//!   line into simple commands, each contributing its base program name.
//! - Substitution constructs (`$(...)`, backticks, `<(...)`, `>(...)`) are
//!   parsed as nested command lines, interleaved at the position found.
//! - Single-quoted spans are literal; substitution-like text inside them
//!   is never recursed into.
//! - Any malformation anywhere fails the WHOLE command. There are no
//!   partial-trust results: the permission checker treats a parse failure
//!   as a hard denial.
//!
//! The two grammar families (POSIX, Windows cmd/PowerShell) are separate
//! strategies behind the [`ShellGrammar`] trait so each family's quoting
//! and operator rules stay independently testable.

mod escape;
mod posix;
mod windows;

use serde::{Deserialize, Serialize};

use crate::core::ShellParseError;

pub use escape::escape_shell_arg;
pub use posix::PosixGrammar;
pub use windows::WindowsGrammar;

/// Substitutions nested beyond this are a parse failure, bounding
/// recursion on hostile input.
pub(crate) const MAX_SUBSTITUTION_DEPTH: usize = 64;

/// The shell grammar family governing parsing and quoting rules.
///
/// `Cmd` and `PowerShell` share the Windows grammar for analysis but
/// differ in how [`escape_shell_arg`] quotes values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellDialect {
    /// sh / bash / zsh family
    Posix,
    /// Windows cmd.exe
    Cmd,
    /// Windows PowerShell / pwsh
    PowerShell,
}

impl ShellDialect {
    /// The dialect of the host operating system
    pub fn host() -> Self {
        if cfg!(windows) {
            ShellDialect::Cmd
        } else {
            ShellDialect::Posix
        }
    }

    /// Whether this dialect parses with the Windows grammar
    pub fn is_windows(&self) -> bool {
        matches!(self, ShellDialect::Cmd | ShellDialect::PowerShell)
    }
}

/// One simple command within a (possibly compound) command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand {
    /// The trimmed source text of this simple command
    pub text: String,
    /// The invoked program's base name, directory path stripped
    pub root: String,
}

/// A dialect-specific parsing strategy.
pub trait ShellGrammar {
    /// Split a raw command line into its simple commands, in the order
    /// encountered, recursing through substitutions. Fails closed on any
    /// syntax the grammar cannot analyze confidently.
    fn parse(&self, command: &str) -> Result<Vec<SimpleCommand>, ShellParseError>;
}

/// The grammar strategy for a dialect
pub fn grammar_for(dialect: ShellDialect) -> &'static dyn ShellGrammar {
    match dialect {
        ShellDialect::Posix => &PosixGrammar,
        ShellDialect::Cmd | ShellDialect::PowerShell => &WindowsGrammar,
    }
}

/// Parse a command line under the given dialect
pub fn parse_command(
    command: &str,
    dialect: ShellDialect,
) -> Result<Vec<SimpleCommand>, ShellParseError> {
    grammar_for(dialect).parse(command)
}

/// Ordered command roots under the given dialect; duplicates preserved per
/// invocation site, including nested substitutions.
pub fn command_roots(
    command: &str,
    dialect: ShellDialect,
) -> Result<Vec<String>, ShellParseError> {
    parse_command(command, dialect).map(|cmds| cmds.into_iter().map(|c| c.root).collect())
}

/// Ordered command roots under the host dialect
pub fn get_command_roots(command: &str) -> Result<Vec<String>, ShellParseError> {
    command_roots(command, ShellDialect::host())
}

/// Base program name of a command word: the part after the last path
/// separator.
pub(crate) fn base_name(word: &str) -> String {
    word.rsplit(['/', '\\']).next().unwrap_or(word).to_string()
}
