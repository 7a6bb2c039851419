//! Shell argument escaping
//!
//! Quotes a literal value so it can be concatenated into a command line
//! for a target dialect without being interpreted.

use super::ShellDialect;

/// Characters that need no quoting in a POSIX shell word
fn posix_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}

/// Quote `value` for safe concatenation into a command line of the given
/// dialect. Empty input produces empty output, with no quoting marks.
pub fn escape_shell_arg(value: &str, dialect: ShellDialect) -> String {
    if value.is_empty() {
        return String::new();
    }
    match dialect {
        ShellDialect::Posix => {
            if value.chars().all(posix_safe) {
                value.to_string()
            } else {
                // Single-quote, closing around each embedded single quote
                format!("'{}'", value.replace('\'', "'\\''"))
            }
        }
        ShellDialect::Cmd => {
            // Double-quote wrap, doubling embedded double quotes
            format!("\"{}\"", value.replace('"', "\"\""))
        }
        ShellDialect::PowerShell => {
            // Single-quote wrap, doubling embedded single quotes; double
            // quotes stay as-is
            format!("'{}'", value.replace('\'', "''"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_stays_empty() {
        for dialect in [ShellDialect::Posix, ShellDialect::Cmd, ShellDialect::PowerShell] {
            assert_eq!(escape_shell_arg("", dialect), "");
        }
    }

    #[test]
    fn test_posix_safe_word_passes_through() {
        assert_eq!(escape_shell_arg("file-name_1.txt", ShellDialect::Posix), "file-name_1.txt");
    }

    #[test]
    fn test_posix_quotes_metacharacters() {
        assert_eq!(escape_shell_arg("a b", ShellDialect::Posix), "'a b'");
        assert_eq!(escape_shell_arg("$(rm -rf /)", ShellDialect::Posix), "'$(rm -rf /)'");
    }

    #[test]
    fn test_posix_embedded_single_quote() {
        assert_eq!(escape_shell_arg("it's", ShellDialect::Posix), "'it'\\''s'");
    }

    #[test]
    fn test_cmd_doubles_double_quotes() {
        assert_eq!(escape_shell_arg("say \"hi\"", ShellDialect::Cmd), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_shell_arg("plain", ShellDialect::Cmd), "\"plain\"");
    }

    #[test]
    fn test_powershell_doubles_single_quotes() {
        assert_eq!(escape_shell_arg("it's", ShellDialect::PowerShell), "'it''s'");
        // Double quotes are left unescaped
        assert_eq!(escape_shell_arg("say \"hi\"", ShellDialect::PowerShell), "'say \"hi\"'");
    }
}
