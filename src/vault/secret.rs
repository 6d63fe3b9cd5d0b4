//! The secret bundle sealed inside a vault record.
//!
//! The bundle is serialized to a small JSON object with a fixed field
//! order, so sealing the same bundle twice produces the same plaintext:
//!
//! ```text
//! {"version":1,"primaryKey":"<base64url>","secondaryKey":"<base64url>"}
//! ```
//!
//! Every intermediate buffer that holds key bytes or their text form is
//! zeroized before it is dropped.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::record::CipherEnvelope;
use crate::codec;
use crate::crypto::{self, VaultKey, PRIVATE_KEY_LEN};
use crate::errors::{Result, VaultError};

/// Current bundle schema version.
pub const BUNDLE_VERSION: u32 = 1;

/// Namespace prefix of the AEAD associated data.
pub const AAD_NAMESPACE: &str = "passkey-vault";

/// Decrypted vault contents.  Never persisted in this form.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretBundle {
    version: u32,
    primary_key: [u8; PRIVATE_KEY_LEN],
    secondary_key: [u8; PRIVATE_KEY_LEN],
}

impl SecretBundle {
    /// Build a bundle at the current schema version.
    pub fn new(primary_key: [u8; PRIVATE_KEY_LEN], secondary_key: [u8; PRIVATE_KEY_LEN]) -> Self {
        Self {
            version: BUNDLE_VERSION,
            primary_key,
            secondary_key,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The Ed25519 signing key seed.
    pub fn primary_key(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.primary_key
    }

    /// Key material reserved for the companion subsystem.
    pub fn secondary_key(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.secondary_key
    }

    /// Public identifier of the primary key.
    pub fn public_key_hex(&self) -> String {
        crypto::public_key_hex(&self.primary_key)
    }

    fn to_plaintext(&self) -> Result<Zeroizing<Vec<u8>>> {
        let primary = Zeroizing::new(codec::encode(&self.primary_key));
        let secondary = Zeroizing::new(codec::encode(&self.secondary_key));
        let wire = BundleRef {
            version: self.version,
            primary_key: &primary,
            secondary_key: &secondary,
        };
        serde_json::to_vec(&wire)
            .map(Zeroizing::new)
            .map_err(|e| VaultError::SerializationError(format!("secret bundle: {e}")))
    }

    fn from_plaintext(plaintext: &[u8]) -> Result<Self> {
        let wire: BundleOwned = serde_json::from_slice(plaintext)
            .map_err(|_| VaultError::SchemaError("decrypted bundle is not valid JSON".into()))?;

        if wire.version != BUNDLE_VERSION {
            return Err(VaultError::SchemaError(format!(
                "bundle version {} is not supported (expected {BUNDLE_VERSION})",
                wire.version
            )));
        }

        let primary = Zeroizing::new(
            codec::decode_array::<PRIVATE_KEY_LEN>(&wire.primary_key)
                .map_err(|_| VaultError::SchemaError("malformed primary key".into()))?,
        );
        let secondary = Zeroizing::new(
            codec::decode_array::<PRIVATE_KEY_LEN>(&wire.secondary_key)
                .map_err(|_| VaultError::SchemaError("malformed secondary key".into()))?,
        );

        Ok(Self::new(*primary, *secondary))
    }
}

impl std::fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBundle")
            .field("version", &self.version)
            .field("primary_key", &"[REDACTED]")
            .field("secondary_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleRef<'a> {
    version: u32,
    primary_key: &'a str,
    secondary_key: &'a str,
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct BundleOwned {
    version: u32,
    primary_key: String,
    secondary_key: String,
}

/// Associated data binding a ciphertext to its vault id and schema version.
pub fn associated_data(vault_id: &str) -> String {
    format!("{AAD_NAMESPACE}:{vault_id}:v{BUNDLE_VERSION}")
}

/// Encrypt a bundle for `vault_id` under `key`.
///
/// A fresh IV is generated on every call.
pub fn seal(key: &VaultKey, vault_id: &str, bundle: &SecretBundle) -> Result<CipherEnvelope> {
    let plaintext = bundle.to_plaintext()?;
    let aad = associated_data(vault_id);
    let (iv, ciphertext) = crypto::encrypt(key.as_bytes(), aad.as_bytes(), &plaintext)?;
    Ok(CipherEnvelope {
        iv: iv.to_vec(),
        ciphertext,
    })
}

/// Decrypt and authenticate a bundle sealed for `vault_id`.
///
/// Returns `IntegrityError` on any authentication failure and
/// `SchemaError` if the decrypted bundle has an unknown version.
pub fn open(key: &VaultKey, vault_id: &str, envelope: &CipherEnvelope) -> Result<SecretBundle> {
    let aad = associated_data(vault_id);
    let plaintext = Zeroizing::new(crypto::decrypt(
        key.as_bytes(),
        aad.as_bytes(),
        &envelope.iv,
        &envelope.ciphertext,
    )?);
    SecretBundle::from_plaintext(&plaintext)
}
