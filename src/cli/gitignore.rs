//! Keep the vault directory out of version control.
//!
//! The directory holds the sealed record and, for the virtual
//! authenticator, the credential secrets themselves.

use std::fs;
use std::path::Path;

/// What [`ensure_ignored`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreOutcome {
    Added,
    AlreadyIgnored,
    /// `.gitignore` could not be written.  Never fatal.
    Failed,
}

/// Directory entries are compared without leading/trailing slashes, so
/// `secrets`, `secrets/` and `/secrets/` all count as the same rule.
fn normalize(entry: &str) -> &str {
    entry.trim().trim_matches('/')
}

/// Append `dir_entry` to `<project_dir>/.gitignore` unless an equivalent
/// rule is already there.  Creates the file if needed.
pub fn ensure_ignored(project_dir: &Path, dir_entry: &str) -> IgnoreOutcome {
    let gitignore_path = project_dir.join(".gitignore");
    let existing = fs::read_to_string(&gitignore_path).unwrap_or_default();

    let wanted = normalize(dir_entry);
    if existing.lines().any(|line| normalize(line) == wanted) {
        return IgnoreOutcome::AlreadyIgnored;
    }

    let separator = if existing.ends_with('\n') || existing.is_empty() {
        ""
    } else {
        "\n"
    };

    match fs::write(&gitignore_path, format!("{existing}{separator}{wanted}/\n")) {
        Ok(()) => IgnoreOutcome::Added,
        Err(_) => IgnoreOutcome::Failed,
    }
}
