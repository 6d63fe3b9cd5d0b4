//! Software implementation of [`PlatformAuthenticator`].
//!
//! Behaves like a WebAuthn virtual authenticator: each credential gets a
//! random 32-byte secret, and extension outputs are pure functions of
//! that secret and the caller's salt:
//!
//! - PRF: `HMAC-SHA256(secret, SHA-256("WebAuthn PRF" || 0x00 || salt))`
//! - hmac-secret: `HMAC-SHA256(secret, salt)`
//!
//! Every extension can be switched off to exercise the fallback chain,
//! ceremonies are counted, and user presence is decided by a pluggable
//! check (the CLI asks on the terminal; tests use a flag).
//!
//! State can be persisted to a JSON file so credentials survive process
//! restarts.  That file holds the credential secrets: it stands in for
//! authenticator hardware and must be protected like it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use super::webauthn::{CeremonyError, CreationOptions, PlatformAuthenticator};
use super::{CredentialId, SecretMethod};
use crate::codec::{deserialize_bytes, serialize_bytes};
use crate::errors::{Result, VaultError};

/// Length of generated credential ids.
const CREDENTIAL_ID_LEN: usize = 16;

/// Domain separator WebAuthn prepends to PRF salts.
const PRF_CONTEXT: &[u8] = b"WebAuthn PRF\x00";

/// Which features the virtual authenticator exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Platform credential API present at all.
    pub available: bool,
    pub prf: bool,
    pub hmac_secret: bool,
    pub large_blob: bool,
}

impl Capabilities {
    /// Everything supported.
    pub fn full() -> Self {
        Self {
            available: true,
            prf: true,
            hmac_secret: true,
            large_blob: true,
        }
    }

    /// Only the given secret mechanism is supported.
    pub fn only(method: SecretMethod) -> Self {
        Self {
            available: true,
            prf: method == SecretMethod::Prf,
            hmac_secret: method == SecretMethod::HmacSecret,
            large_blob: method == SecretMethod::LargeBlob,
        }
    }

    /// Credential API present, but no way to get a secret out.
    pub fn none() -> Self {
        Self {
            available: true,
            prf: false,
            hmac_secret: false,
            large_blob: false,
        }
    }

    /// No credential API.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::none()
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredential {
    rp_id: String,
    user_name: String,
    #[serde(serialize_with = "serialize_bytes", deserialize_with = "deserialize_bytes")]
    secret: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    large_blob: Option<String>,
}

#[derive(Default, Serialize, Deserialize)]
struct AuthenticatorState {
    /// Keyed by the credential id's base64url text.
    credentials: HashMap<String, StoredCredential>,
}

type PresenceCheck = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// A software passkey authenticator.
pub struct VirtualAuthenticator {
    capabilities: Capabilities,
    state: Mutex<AuthenticatorState>,
    presence: PresenceCheck,
    ceremonies: AtomicUsize,
    path: Option<PathBuf>,
}

impl VirtualAuthenticator {
    /// In-memory authenticator that approves every ceremony.
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            state: Mutex::new(AuthenticatorState::default()),
            presence: Box::new(|_| true),
            ceremonies: AtomicUsize::new(0),
            path: None,
        }
    }

    /// Load authenticator state from `path`, or start empty if the file
    /// does not exist yet.  Changes are written back to the same file.
    pub fn open(path: &Path, capabilities: Capabilities) -> Result<Self> {
        let state = if path.exists() {
            let data = fs::read_to_string(path)?;
            serde_json::from_str(&data).map_err(|e| {
                VaultError::StorageUnavailable(format!(
                    "authenticator state {}: {e}",
                    path.display()
                ))
            })?
        } else {
            AuthenticatorState::default()
        };

        Ok(Self {
            state: Mutex::new(state),
            path: Some(path.to_path_buf()),
            ..Self::new(capabilities)
        })
    }

    /// Replace the user-presence check.  It receives a short description
    /// of the ceremony and returns whether the user approved it.
    pub fn with_presence<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.presence = Box::new(check);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Number of ceremonies run so far (successful or not).
    pub fn ceremony_count(&self) -> usize {
        self.ceremonies.load(Ordering::SeqCst)
    }

    /// Number of enrolled credentials.
    pub fn credential_count(&self) -> usize {
        self.lock_state().credentials.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, AuthenticatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the ceremony and ask for user presence.
    fn ceremony(&self, description: &str) -> std::result::Result<(), CeremonyError> {
        self.ceremonies.fetch_add(1, Ordering::SeqCst);
        if !self.capabilities.available {
            return Err(CeremonyError::Unavailable(
                "virtual authenticator is disabled".into(),
            ));
        }
        if (self.presence)(description) {
            Ok(())
        } else {
            Err(CeremonyError::NotAllowed(
                "user declined the authenticator prompt".into(),
            ))
        }
    }

    fn credential_secret(
        &self,
        rp_id: &str,
        credential: &CredentialId,
    ) -> std::result::Result<Zeroizing<Vec<u8>>, CeremonyError> {
        let state = self.lock_state();
        match state.credentials.get(&credential.to_text()) {
            Some(stored) if stored.rp_id == rp_id => Ok(Zeroizing::new(stored.secret.clone())),
            _ => Err(CeremonyError::NotAllowed(
                "credential is not known to this authenticator".into(),
            )),
        }
    }

    fn hmac(secret: &[u8], input: &[u8]) -> std::result::Result<Zeroizing<Vec<u8>>, CeremonyError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret)
            .map_err(|e| CeremonyError::Failed(format!("invalid credential secret: {e}")))?;
        mac.update(input);
        Ok(Zeroizing::new(mac.finalize().into_bytes().to_vec()))
    }

    fn persist(&self, state: &AuthenticatorState) -> std::result::Result<(), CeremonyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_state(path, state)
            .map_err(|e| CeremonyError::Failed(format!("failed to save authenticator state: {e}")))
    }
}

/// Atomic write: temp file in the same directory, then rename.
fn write_state(path: &Path, state: &AuthenticatorState) -> Result<()> {
    let json = Zeroizing::new(
        serde_json::to_vec_pretty(state)
            .map_err(|e| VaultError::SerializationError(format!("authenticator state: {e}")))?,
    );

    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() && !parent.exists() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, json.as_slice())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl PlatformAuthenticator for VirtualAuthenticator {
    fn is_available(&self) -> bool {
        self.capabilities.available
    }

    fn create_credential(
        &self,
        options: &CreationOptions,
    ) -> std::result::Result<CredentialId, CeremonyError> {
        self.ceremony(&format!("Create a passkey for {}", options.rp_name))?;

        let mut id = vec![0u8; CREDENTIAL_ID_LEN];
        rand::rng().fill_bytes(&mut id);
        let mut secret = vec![0u8; 32];
        rand::rng().fill_bytes(&mut secret);

        let credential = CredentialId::from_bytes(id);
        let mut state = self.lock_state();
        state.credentials.insert(
            credential.to_text(),
            StoredCredential {
                rp_id: options.rp_id.clone(),
                user_name: options.user_name.clone(),
                secret,
                large_blob: None,
            },
        );
        self.persist(&state)?;
        debug!(credential = %credential, "virtual authenticator created credential");
        Ok(credential)
    }

    fn evaluate_prf(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        salt: &[u8],
    ) -> std::result::Result<Zeroizing<Vec<u8>>, CeremonyError> {
        if !self.capabilities.prf {
            return Err(CeremonyError::ExtensionUnsupported(SecretMethod::Prf));
        }
        self.ceremony("Unlock with your passkey")?;
        let secret = self.credential_secret(rp_id, credential)?;

        let mut hasher = Sha256::new();
        hasher.update(PRF_CONTEXT);
        hasher.update(salt);
        let prf_salt = hasher.finalize();

        Self::hmac(&secret, &prf_salt)
    }

    fn evaluate_hmac_secret(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        salt: &[u8],
    ) -> std::result::Result<Zeroizing<Vec<u8>>, CeremonyError> {
        if !self.capabilities.hmac_secret {
            return Err(CeremonyError::ExtensionUnsupported(SecretMethod::HmacSecret));
        }
        self.ceremony("Unlock with your passkey")?;
        let secret = self.credential_secret(rp_id, credential)?;
        Self::hmac(&secret, salt)
    }

    fn read_large_blob(
        &self,
        rp_id: &str,
        credential: &CredentialId,
    ) -> std::result::Result<Option<Zeroizing<Vec<u8>>>, CeremonyError> {
        if !self.capabilities.large_blob {
            return Err(CeremonyError::ExtensionUnsupported(SecretMethod::LargeBlob));
        }
        self.ceremony("Read passkey data")?;
        self.credential_secret(rp_id, credential)?;

        let state = self.lock_state();
        let blob = state
            .credentials
            .get(&credential.to_text())
            .and_then(|c| c.large_blob.as_deref())
            .map(crate::codec::decode)
            .transpose()
            .map_err(|e| CeremonyError::Failed(format!("corrupt large blob: {e}")))?;
        Ok(blob.map(Zeroizing::new))
    }

    fn write_large_blob(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        blob: &[u8],
    ) -> std::result::Result<(), CeremonyError> {
        if !self.capabilities.large_blob {
            return Err(CeremonyError::ExtensionUnsupported(SecretMethod::LargeBlob));
        }
        self.ceremony("Save passkey data")?;
        self.credential_secret(rp_id, credential)?;

        let mut state = self.lock_state();
        if let Some(stored) = state.credentials.get_mut(&credential.to_text()) {
            stored.large_blob = Some(crate::codec::encode(blob));
        }
        self.persist(&state)
    }
}
