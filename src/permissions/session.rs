//! Session allow-list

use std::collections::HashSet;

/// Whitespace-normalized form used for exact command comparison
pub(crate) fn normalize_command(command: &str) -> String {
    command.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ephemeral, in-memory set of exact commands the user has approved for
/// the rest of one session.
///
/// Its presence flips the permission checker from
/// "default-allow-unless-denied" to "default-deny-unless-listed". Only
/// grows, and only via explicit user approval.
#[derive(Debug, Clone, Default)]
pub struct SessionAllowlist {
    commands: HashSet<String>,
}

impl SessionAllowlist {
    /// Create an empty allow-list
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user-approved command
    pub fn approve(&mut self, command: impl AsRef<str>) {
        let normalized = normalize_command(command.as_ref());
        tracing::info!("session allowlist: approving `{}`", normalized);
        self.commands.insert(normalized);
    }

    /// Whether the exact command has been approved this session
    pub fn contains(&self, command: &str) -> bool {
        self.commands.contains(&normalize_command(command))
    }

    /// Number of approved commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no command has been approved yet
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl FromIterator<String> for SessionAllowlist {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut list = Self::new();
        for command in iter {
            list.commands.insert(normalize_command(&command));
        }
        list
    }
}
