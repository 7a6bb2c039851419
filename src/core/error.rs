//! Library error types

use thiserror::Error;

/// Errors produced while analyzing a shell command line.
///
/// Any of these forces the whole command to be treated as unparseable:
/// the permission checker never degrades a parse failure into a partial
/// root list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellParseError {
    /// A quote was opened and never closed
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),

    /// A `$(`, backtick, `<(` or `>(` substitution was never closed
    #[error("unterminated command substitution")]
    UnterminatedSubstitution,

    /// A `)` with no matching opener
    #[error("unbalanced closing parenthesis")]
    UnbalancedParenthesis,

    /// An operator with nothing to execute before it (e.g. `;;`, leading `&&`)
    #[error("empty command before `{0}`")]
    EmptyCommand(String),

    /// The command line ends in an operator expecting another command or a
    /// redirection expecting a target
    #[error("command line ends with `{0}`")]
    TrailingOperator(String),

    /// A trailing backslash awaiting more input
    #[error("dangling escape at end of command")]
    DanglingEscape,

    /// A construct this analyzer refuses to reason about (here-documents,
    /// subshell grouping, shell function definitions)
    #[error("unsupported shell construct: {0}")]
    Unsupported(String),

    /// Substitutions nested beyond the safety limit
    #[error("substitution nesting too deep")]
    NestingTooDeep,
}

/// Errors that can occur in the authorization library
#[derive(Error, Debug)]
pub enum GuardError {
    /// A shell command line could not be analyzed
    #[error("shell parse error: {0}")]
    Parse(#[from] ShellParseError),

    /// An argument pattern failed to compile
    #[error("invalid args pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Result type alias for library operations
pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ShellParseError::UnterminatedQuote('\'');
        assert_eq!(err.to_string(), "unterminated ' quote");

        let err = ShellParseError::TrailingOperator("&&".into());
        assert_eq!(err.to_string(), "command line ends with `&&`");
    }

    #[test]
    fn test_guard_error_from_parse() {
        let guard: GuardError = ShellParseError::UnterminatedSubstitution.into();
        assert!(matches!(guard, GuardError::Parse(_)));
    }
}
