//! CLI module: Clap argument parser, shared context, and command implementations.
//!
//! The binary drives a [`VirtualAuthenticator`] persisted next to the vault
//! database, standing in for a platform passkey.  Every ceremony asks the
//! user to confirm presence on the terminal unless
//! `PASSKEY_VAULT_AUTO_APPROVE=1` is set.

pub mod commands;
pub mod gitignore;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use crate::config::Settings;
use crate::credential::{Capabilities, VirtualAuthenticator, WebAuthnProvider};
use crate::errors::{Result, VaultError};
use crate::vault::{SessionCache, SqliteStore, VaultController};

/// Env var that approves every authenticator prompt (scripts, CI).
pub const AUTO_APPROVE_ENV: &str = "PASSKEY_VAULT_AUTO_APPROVE";

/// File holding the virtual authenticator's credentials.
pub const AUTHENTICATOR_FILE: &str = "authenticator.json";

/// Passkey Vault CLI: a signing key sealed behind a passkey.
#[derive(Parser)]
#[command(
    name = "passkey-vault",
    about = "Signing keys sealed behind a passkey",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault directory (default: .passkey-vault, or `vault_dir` in .passkey-vault.toml)
    #[arg(long, global = true)]
    pub vault_dir: Option<String>,

    /// Vault id to operate on (default: default)
    #[arg(long, global = true)]
    pub vault_id: Option<String>,

    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a vault bound to a new passkey
    Init {
        /// Move the legacy plaintext key into the vault instead of generating one
        #[arg(long)]
        migrate: bool,
    },

    /// Unlock the vault with the passkey and show its public key
    Unlock,

    /// Show vault state without touching the passkey
    Status,

    /// Delete the vault record and its flags
    Delete {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show version
    Version,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },

    /// Review init, unlock and delete attempts, including failed ones
    #[cfg(feature = "audit-log")]
    Audit {
        /// Number of entries to show
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
        /// Only show failed attempts
        #[arg(long)]
        failures: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// The controller type every command works with.
pub type CliController = VaultController<WebAuthnProvider<VirtualAuthenticator>, SqliteStore>;

/// Settings resolved from `.passkey-vault.toml` plus command-line overrides.
#[derive(Debug, Clone)]
pub struct Context {
    pub project_dir: PathBuf,
    pub settings: Settings,
    pub vault_dir: PathBuf,
    pub vault_id: String,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let project_dir = std::env::current_dir()?;
        let mut settings = Settings::load(&project_dir)?;

        if let Some(dir) = &cli.vault_dir {
            settings.vault_dir = dir.clone();
        }
        if let Some(id) = &cli.vault_id {
            settings.vault_id = id.clone();
        }
        validate_vault_id(&settings.vault_id)?;

        Ok(Self {
            vault_dir: settings.vault_dir(&project_dir),
            vault_id: settings.vault_id.clone(),
            project_dir,
            settings,
        })
    }

    /// Open the vault database, creating the directory if needed.
    pub fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.vault_dir)
    }

    /// Build a controller over the on-disk store and authenticator.
    pub fn controller(&self) -> Result<CliController> {
        let store = self.open_store()?;
        let authenticator = VirtualAuthenticator::open(
            &self.vault_dir.join(AUTHENTICATOR_FILE),
            Capabilities::full(),
        )?
        .with_presence(confirm_presence);
        let provider = WebAuthnProvider::new(authenticator, self.settings.relying_party());

        Ok(VaultController::new(provider, store, Arc::new(SessionCache::new()))
            .with_vault_id(&self.vault_id)
            .with_large_blob_fallback(self.settings.allow_large_blob_fallback))
    }
}

/// Whether `PASSKEY_VAULT_AUTO_APPROVE` is set to a truthy value.
pub fn auto_approve() -> bool {
    std::env::var(AUTO_APPROVE_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// User-presence check for the virtual authenticator.
///
/// A prompt that cannot be shown (no terminal) counts as declined.
fn confirm_presence(description: &str) -> bool {
    if auto_approve() {
        return true;
    }
    dialoguer::Confirm::new()
        .with_prompt(format!("{description}?"))
        .default(true)
        .interact()
        .unwrap_or(false)
}

/// Validate that a vault id is safe and sensible.
///
/// Allowed: lowercase letters, digits, hyphens. Must not be empty
/// or start/end with a hyphen. Max length 64 characters.
pub fn validate_vault_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(VaultError::ConfigError("vault id cannot be empty".into()));
    }

    if id.len() > 64 {
        return Err(VaultError::ConfigError(
            "vault id cannot exceed 64 characters".into(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(VaultError::ConfigError(format!(
            "vault id '{id}' is invalid: only lowercase letters, digits, and hyphens are allowed"
        )));
    }

    if id.starts_with('-') || id.ends_with('-') {
        return Err(VaultError::ConfigError(format!(
            "vault id '{id}' cannot start or end with a hyphen"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_vault_ids() {
        assert!(validate_vault_id("default").is_ok());
        assert!(validate_vault_id("work").is_ok());
        assert!(validate_vault_id("team-2").is_ok());
    }

    #[test]
    fn rejects_empty_id() {
        assert!(validate_vault_id("").is_err());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(validate_vault_id("Default").is_err());
    }

    #[test]
    fn rejects_special_chars() {
        assert!(validate_vault_id("a.b").is_err());
        assert!(validate_vault_id("a/b").is_err());
        assert!(validate_vault_id("a b").is_err());
        assert!(validate_vault_id("a:b").is_err());
    }

    #[test]
    fn rejects_leading_trailing_hyphens() {
        assert!(validate_vault_id("-work").is_err());
        assert!(validate_vault_id("work-").is_err());
    }

    #[test]
    fn rejects_too_long_id() {
        assert!(validate_vault_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "passkey-vault",
            "init",
            "--migrate",
            "--vault-id",
            "work",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(cli.vault_id.as_deref(), Some("work"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Init { migrate: true }));
    }
}
