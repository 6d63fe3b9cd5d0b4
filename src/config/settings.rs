use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::credential::RelyingParty;
use crate::errors::{Result, VaultError};

/// Project-level configuration, loaded from `.passkey-vault.toml`.
///
/// Every field has a default so the vault works without any config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to project root) holding the vault database.
    #[serde(default = "default_vault_dir")]
    pub vault_dir: String,

    /// Record id of the vault to operate on.
    #[serde(default = "default_vault_id")]
    pub vault_id: String,

    /// WebAuthn relying party id credentials are scoped to.
    #[serde(default = "default_relying_party_id")]
    pub relying_party_id: String,

    #[serde(default = "default_relying_party_name")]
    pub relying_party_name: String,

    /// User name shown by the authenticator at enrollment.
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Permit the large-blob seed when neither PRF nor hmac-secret exist.
    ///
    /// The seed is stored on the authenticator, so its confidentiality
    /// is only as good as the authenticator's blob storage.
    #[serde(default = "default_allow_large_blob_fallback")]
    pub allow_large_blob_fallback: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_dir() -> String {
    ".passkey-vault".to_string()
}

fn default_vault_id() -> String {
    crate::vault::DEFAULT_VAULT_ID.to_string()
}

fn default_relying_party_id() -> String {
    "localhost".to_string()
}

fn default_relying_party_name() -> String {
    "Passkey Vault".to_string()
}

fn default_user_name() -> String {
    "vault".to_string()
}

fn default_allow_large_blob_fallback() -> bool {
    true
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            vault_id: default_vault_id(),
            relying_party_id: default_relying_party_id(),
            relying_party_name: default_relying_party_name(),
            user_name: default_user_name(),
            allow_large_blob_fallback: default_allow_large_blob_fallback(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".passkey-vault.toml";

    /// Load settings from `<project_dir>/.passkey-vault.toml`.
    ///
    /// A missing file yields defaults; an unparsable one is an error.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.vault_id.trim().is_empty() {
            return Err(VaultError::ConfigError(format!(
                "{}: vault_id cannot be empty",
                config_path.display()
            )));
        }

        Ok(settings)
    }

    /// Full path to the vault directory.
    ///
    /// Example: `project_dir/.passkey-vault`
    pub fn vault_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_dir)
    }

    /// The relying party credentials are created for.
    pub fn relying_party(&self) -> RelyingParty {
        RelyingParty {
            id: self.relying_party_id.clone(),
            name: self.relying_party_name.clone(),
            user_name: self.user_name.clone(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
