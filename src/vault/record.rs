//! The persisted vault record.
//!
//! One record exists per vault id.  It holds only ciphertext and public
//! metadata; the decrypted bundle never touches storage.
//!
//! JSON layout (field names are part of the storage format):
//!
//! ```text
//! {
//!   "id": "default",
//!   "version": 1,
//!   "credentialId": "<base64url>",
//!   "prfSalt": "<base64url, 32 bytes>",
//!   "cipher": { "iv": "<base64url, 12 bytes>", "ciphertext": "<base64url>" },
//!   "publicKeyHex": "<64 hex chars>",
//!   "createdAtMs": 1700000000000,
//!   "updatedAtMs": 1700000000000
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::{deserialize_bytes, serialize_bytes};
use crate::credential::CredentialId;
use crate::crypto::{IV_LEN, SALT_LEN};
use crate::errors::{Result, VaultError};

/// Current record schema version.
pub const RECORD_VERSION: u32 = 1;

/// Vault id used when the caller does not pick one.
pub const DEFAULT_VAULT_ID: &str = "default";

/// AEAD output stored in the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherEnvelope {
    /// 96-bit IV, fresh for every seal.
    #[serde(serialize_with = "serialize_bytes", deserialize_with = "deserialize_bytes")]
    pub iv: Vec<u8>,

    /// Ciphertext with the 16-byte GCM tag appended.
    #[serde(serialize_with = "serialize_bytes", deserialize_with = "deserialize_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Durable, encrypted projection of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub id: String,

    pub version: u32,

    pub credential_id: CredentialId,

    /// Salt fed to both the PRF evaluation and HKDF.
    #[serde(
        rename = "prfSalt",
        serialize_with = "serialize_bytes",
        deserialize_with = "deserialize_bytes"
    )]
    pub salt: Vec<u8>,

    pub cipher: CipherEnvelope,

    pub public_key_hex: String,

    pub created_at_ms: i64,

    pub updated_at_ms: i64,
}

impl VaultRecord {
    /// Check the structural invariants of a record read from storage.
    ///
    /// Unknown versions and wrong-length salts or IVs are schema errors;
    /// tampering inside the ciphertext is caught later by the AEAD tag.
    pub fn validate(&self) -> Result<()> {
        if self.version != RECORD_VERSION {
            return Err(VaultError::SchemaError(format!(
                "record version {} is not supported (expected {RECORD_VERSION})",
                self.version
            )));
        }
        if self.salt.len() != SALT_LEN {
            return Err(VaultError::SchemaError(format!(
                "salt must be {SALT_LEN} bytes, got {}",
                self.salt.len()
            )));
        }
        if self.cipher.iv.len() != IV_LEN {
            return Err(VaultError::SchemaError(format!(
                "iv must be {IV_LEN} bytes, got {}",
                self.cipher.iv.len()
            )));
        }
        if self.id.is_empty() {
            return Err(VaultError::SchemaError("record has an empty id".into()));
        }
        Ok(())
    }

    /// Serialize to the stored JSON form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| VaultError::SerializationError(format!("vault record: {e}")))
    }

    /// Parse and validate the stored JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(json)
            .map_err(|e| VaultError::SchemaError(format!("vault record JSON: {e}")))?;
        record.validate()?;
        Ok(record)
    }
}
