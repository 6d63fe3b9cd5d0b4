//! Vault lifecycle: create, unlock, lock, delete, and legacy-key migration.
//!
//! ```text
//!            create              lock
//!  NoVault ─────────▶ Unlocked ───────▶ Locked
//!     ▲                  ▲                 │
//!     │                  └──── unlock ─────┘
//!     └──────────── delete (from any state)
//! ```
//!
//! The controller owns no secret state of its own.  The only decrypted
//! copy lives in the shared [`SessionCache`]; the store only ever sees
//! the sealed record and public flags.

use std::sync::Arc;

use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::record::{VaultRecord, DEFAULT_VAULT_ID, RECORD_VERSION};
use super::secret::{self, SecretBundle};
use super::session::{SessionCache, UnlockedVaultSession};
use super::store::{FlagStore, RecordStore};
use crate::credential::{CredentialProvider, DeriveOptions, SecretMethod};
use crate::crypto::{self, PRIVATE_KEY_LEN};
use crate::errors::{Result, VaultError};

/// Flag keys written next to the vault record.
pub mod flags {
    /// `"true"` while a vault exists.
    pub const ENABLED: &str = "vault.enabled";
    pub const ACTIVE_ID: &str = "vault.activeId";
    pub const CREDENTIAL_ID: &str = "vault.credentialId";
    pub const PUBLIC_KEY_HEX: &str = "vault.publicKeyHex";

    /// Hex private key written by versions without a vault.
    pub const LEGACY_PRIVATE_KEY: &str = "legacy.privateKeyHex";
    /// Identifier the legacy key was registered under, if recorded.
    pub const LEGACY_PUBLIC_KEY: &str = "legacy.publicKeyHex";

    /// Prefix of per-identity "registered" markers.
    pub const REGISTERED_PREFIX: &str = "registered:";

    pub(crate) const VAULT_FLAGS: [&str; 4] = [ENABLED, ACTIVE_ID, CREDENTIAL_ID, PUBLIC_KEY_HEX];

    pub fn registered(public_key_hex: &str) -> String {
        format!("{REGISTERED_PREFIX}{public_key_hex}")
    }
}

/// Lifecycle state of one vault id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    NoVault,
    Locked,
    Unlocked,
}

impl std::fmt::Display for VaultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoVault => "no vault",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        };
        f.write_str(name)
    }
}

/// Public flags, readable without a ceremony.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultStatus {
    pub enabled: bool,
    pub active_vault_id: Option<String>,
    pub credential_id: Option<String>,
    pub public_key_hex: Option<String>,
    pub legacy_key_present: bool,
}

/// Read the public flags from `store`.
pub fn read_status(store: &impl FlagStore) -> Result<VaultStatus> {
    Ok(VaultStatus {
        enabled: store.get_flag(flags::ENABLED)?.as_deref() == Some("true"),
        active_vault_id: store.get_flag(flags::ACTIVE_ID)?,
        credential_id: store.get_flag(flags::CREDENTIAL_ID)?,
        public_key_hex: store.get_flag(flags::PUBLIC_KEY_HEX)?,
        legacy_key_present: store.get_flag(flags::LEGACY_PRIVATE_KEY)?.is_some(),
    })
}

/// Per-identity client state (nonce caches, pending transactions) that
/// must be reset when the vault starts with a brand-new key.
pub trait SessionCounters {
    fn reset(&self, public_key_hex: &str) -> Result<()>;
}

/// [`SessionCounters`] for callers with nothing to reset.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSessionCounters;

impl SessionCounters for NoSessionCounters {
    fn reset(&self, _public_key_hex: &str) -> Result<()> {
        Ok(())
    }
}

/// Options for [`VaultController::create`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Reuse the legacy plaintext key, if one exists, as the signing key.
    pub migrate_legacy: bool,
}

/// Result of a successful [`VaultController::create`].
#[derive(Debug, Clone)]
pub struct CreatedVault {
    pub session: Arc<UnlockedVaultSession>,
    pub secret_method: SecretMethod,
    /// Whether the signing key came from the legacy store.
    pub migrated: bool,
}

struct LegacyKey {
    private_key: Zeroizing<[u8; PRIVATE_KEY_LEN]>,
    identifier: String,
}

/// Orchestrates the credential provider, crypto, store, and session cache.
pub struct VaultController<P, S> {
    provider: P,
    store: S,
    cache: Arc<SessionCache>,
    counters: Box<dyn SessionCounters>,
    vault_id: String,
    allow_large_blob: bool,
}

impl<P, S> VaultController<P, S>
where
    P: CredentialProvider,
    S: RecordStore + FlagStore,
{
    pub fn new(provider: P, store: S, cache: Arc<SessionCache>) -> Self {
        Self {
            provider,
            store,
            cache,
            counters: Box::new(NoSessionCounters),
            vault_id: DEFAULT_VAULT_ID.to_string(),
            allow_large_blob: true,
        }
    }

    pub fn with_vault_id(mut self, vault_id: &str) -> Self {
        self.vault_id = vault_id.to_string();
        self
    }

    pub fn with_session_counters(mut self, counters: Box<dyn SessionCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Allow or forbid the large-blob seed fallback.
    pub fn with_large_blob_fallback(mut self, allow: bool) -> Self {
        self.allow_large_blob = allow;
        self
    }

    pub fn vault_id(&self) -> &str {
        &self.vault_id
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The cached session for this vault id, if unlocked.
    pub fn session(&self) -> Option<Arc<UnlockedVaultSession>> {
        self.cache.get().filter(|s| s.vault_id() == self.vault_id)
    }

    /// A stored record counts even when it no longer parses, so a
    /// damaged vault reads as `Locked` and can still be deleted.
    pub fn state(&self) -> Result<VaultState> {
        if self.session().is_some() {
            return Ok(VaultState::Unlocked);
        }
        if self.store.contains(&self.vault_id)? {
            Ok(VaultState::Locked)
        } else {
            Ok(VaultState::NoVault)
        }
    }

    /// Public flags, without touching the authenticator.
    pub fn status(&self) -> Result<VaultStatus> {
        read_status(&self.store)
    }

    /// Whether the public flags describe (or may be claimed by) this vault.
    ///
    /// The flags belong to one vault at a time.  A vault claims them on
    /// create when no other stored vault holds them, and releases them on
    /// delete.
    pub fn owns_flags(&self) -> Result<bool> {
        match self.store.get_flag(flags::ACTIVE_ID)? {
            Some(active) if active != self.vault_id => Ok(!self.store.contains(&active)?),
            _ => Ok(true),
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Create the vault: enroll a credential, seal a new bundle, persist it,
    /// and leave the vault unlocked.
    ///
    /// Nothing is written until every derivation and sealing step has
    /// succeeded.  If a later step fails, everything this call wrote is
    /// removed again.
    pub fn create(&self, options: CreateOptions) -> Result<CreatedVault> {
        let vault_id = self.vault_id.as_str();
        if self.store.contains(vault_id)? {
            return Err(VaultError::VaultAlreadyExists(vault_id.to_string()));
        }

        let legacy = if options.migrate_legacy {
            self.read_legacy_key()?
        } else {
            None
        };

        // 1. Enroll and obtain the credential-bound secret.
        let credential_id = self.provider.enroll()?;
        let salt = crypto::generate_salt();
        let derived = self.provider.derive_secret(
            &credential_id,
            &salt,
            &DeriveOptions::enrollment().with_large_blob(self.allow_large_blob),
        )?;
        debug!(method = %derived.method(), "credential secret obtained for enrollment");

        // 2. Pick the signing key and fresh secondary material.
        let primary = match &legacy {
            Some(legacy) => legacy.private_key.clone(),
            None => crypto::generate_private_key(),
        };
        let secondary = crypto::generate_private_key();
        let bundle = SecretBundle::new(*primary, *secondary);

        // 3. Derive the AEAD key and seal.
        let key = crypto::derive_vault_key(derived.as_bytes(), &salt)?;
        let cipher = secret::seal(&key, vault_id, &bundle)?;

        let now = Utc::now().timestamp_millis();
        let record = VaultRecord {
            id: vault_id.to_string(),
            version: RECORD_VERSION,
            credential_id: credential_id.clone(),
            salt: salt.to_vec(),
            cipher,
            public_key_hex: bundle.public_key_hex(),
            created_at_ms: now,
            updated_at_ms: now,
        };

        // 4. Persist.  Flags go second so "enabled" never points at nothing.
        let claim_flags = self.owns_flags()?;
        self.store.put(&record)?;
        if claim_flags {
            if let Err(e) = self.write_vault_flags(&record) {
                warn!(error = %e, "writing vault flags failed, rolling back record");
                self.roll_back(claim_flags);
                return Err(e);
            }
        } else {
            debug!(vault_id, "another vault holds the public flags, leaving them");
        }

        // 5. Migrate or reset per-identity state.
        let migrated = legacy.is_some();
        let post_persist = match &legacy {
            Some(legacy) => self.finish_migration(legacy, &record.public_key_hex),
            None => self.counters.reset(&record.public_key_hex),
        };
        if let Err(e) = post_persist {
            warn!(error = %e, "post-create step failed, rolling back vault");
            self.roll_back(claim_flags);
            return Err(e);
        }
        info!(vault_id, public_key = %record.public_key_hex, "vault created");

        // 6. Leave the vault unlocked.
        let session = Arc::new(UnlockedVaultSession::new(vault_id, credential_id, &bundle));
        self.cache.set(Arc::clone(&session));

        Ok(CreatedVault {
            session,
            secret_method: derived.method(),
            migrated,
        })
    }

    /// Unlock the vault with a fresh ceremony.
    ///
    /// If this vault is already unlocked the cached session is returned and
    /// no ceremony runs.  On any failure the cache is left as it was.
    pub fn unlock(&self) -> Result<Arc<UnlockedVaultSession>> {
        if let Some(session) = self.session() {
            debug!(vault_id = %self.vault_id, "vault already unlocked");
            return Ok(session);
        }

        let vault_id = self.vault_id.as_str();
        let record = self
            .store
            .get(vault_id)?
            .ok_or_else(|| VaultError::VaultNotFound(vault_id.to_string()))?;

        let derived = self.provider.derive_secret(
            &record.credential_id,
            &record.salt,
            &DeriveOptions::unlock().with_large_blob(self.allow_large_blob),
        )?;
        let key = crypto::derive_vault_key(derived.as_bytes(), &record.salt)?;
        let bundle = secret::open(&key, vault_id, &record.cipher)?;

        let derived_public = bundle.public_key_hex();
        if !bool::from(
            derived_public
                .as_bytes()
                .ct_eq(record.public_key_hex.as_bytes()),
        ) {
            warn!(vault_id, "decrypted key does not match the record's public key");
            return Err(VaultError::IntegrityError);
        }

        let session = Arc::new(UnlockedVaultSession::new(
            vault_id,
            record.credential_id,
            &bundle,
        ));
        self.cache.set(Arc::clone(&session));
        info!(vault_id, method = %derived.method(), "vault unlocked");
        Ok(session)
    }

    /// Forget this vault's decrypted session.  Persistent state and other
    /// vaults' sessions are untouched.
    pub fn lock(&self) {
        if self.cache.clear_vault(&self.vault_id) {
            info!(vault_id = %self.vault_id, "vault locked");
        }
    }

    /// Remove the vault record, its cached session, and the public flags
    /// if this vault holds them.
    pub fn delete(&self) -> Result<()> {
        let release_flags = self.owns_flags()?;
        self.store.delete(&self.vault_id)?;
        self.cache.clear_vault(&self.vault_id);
        if release_flags {
            for key in flags::VAULT_FLAGS {
                self.store.remove_flag(key)?;
            }
        }
        info!(vault_id = %self.vault_id, "vault deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn write_vault_flags(&self, record: &VaultRecord) -> Result<()> {
        self.store.set_flag(flags::ACTIVE_ID, &record.id)?;
        self.store
            .set_flag(flags::CREDENTIAL_ID, &record.credential_id.to_text())?;
        self.store
            .set_flag(flags::PUBLIC_KEY_HEX, &record.public_key_hex)?;
        self.store.set_flag(flags::ENABLED, "true")
    }

    /// Undo a partial create.  Failures are logged, never raised, so the
    /// caller still sees the error that caused the rollback.
    fn roll_back(&self, clear_flags: bool) {
        if let Err(e) = self.store.delete(&self.vault_id) {
            warn!(vault_id = %self.vault_id, error = %e, "rollback left an orphaned vault record");
        }
        if !clear_flags {
            return;
        }
        for key in flags::VAULT_FLAGS {
            best_effort(key, self.store.remove_flag(key));
        }
    }

    fn read_legacy_key(&self) -> Result<Option<LegacyKey>> {
        let Some(hex_key) = self.store.get_flag(flags::LEGACY_PRIVATE_KEY)? else {
            debug!("migration requested but no legacy key is stored");
            return Ok(None);
        };
        let hex_key = Zeroizing::new(hex_key);

        let mut private_key = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        hex::decode_to_slice(hex_key.trim(), &mut private_key[..])
            .map_err(|e| VaultError::InvalidLegacyKey(format!("expected 64 hex chars: {e}")))?;

        let identifier = match self.store.get_flag(flags::LEGACY_PUBLIC_KEY)? {
            Some(id) => id,
            None => crypto::public_key_hex(&private_key),
        };

        Ok(Some(LegacyKey {
            private_key,
            identifier,
        }))
    }

    /// Move the "registered" marker to the new identifier, then erase
    /// the plaintext legacy key.
    ///
    /// The private key is removed last.  Any earlier failure restores the
    /// flags this step touched, so a rolled-back create never loses the
    /// only copy of the legacy key.
    fn finish_migration(&self, legacy: &LegacyKey, public_key_hex: &str) -> Result<()> {
        let old_flag = flags::registered(&legacy.identifier);
        let new_flag = flags::registered(public_key_hex);
        let marker = self.store.get_flag(&old_flag)?;
        let legacy_public = self.store.get_flag(flags::LEGACY_PUBLIC_KEY)?;

        let moved = (|| -> Result<()> {
            if let Some(value) = &marker {
                self.store.set_flag(&new_flag, value)?;
                if old_flag != new_flag {
                    self.store.remove_flag(&old_flag)?;
                }
            }
            self.store.remove_flag(flags::LEGACY_PUBLIC_KEY)?;
            self.store.remove_flag(flags::LEGACY_PRIVATE_KEY)
        })();

        if let Err(e) = moved {
            if let Some(value) = &marker {
                if old_flag != new_flag {
                    best_effort(&new_flag, self.store.remove_flag(&new_flag));
                }
                best_effort(&old_flag, self.store.set_flag(&old_flag, value));
            }
            if let Some(id) = &legacy_public {
                best_effort(
                    flags::LEGACY_PUBLIC_KEY,
                    self.store.set_flag(flags::LEGACY_PUBLIC_KEY, id),
                );
            }
            return Err(e);
        }

        info!(public_key = public_key_hex, "legacy key migrated into vault and erased");
        Ok(())
    }
}

/// Log a flag write that failed while undoing a partial create.
fn best_effort(flag: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(flag, error = %e, "rollback could not restore flag");
    }
}
