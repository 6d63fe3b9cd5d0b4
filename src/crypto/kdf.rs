//! Vault key derivation using HKDF-SHA256.
//!
//! The authenticator hands us a credential-bound secret (PRF output,
//! hmac-secret output, or a large-blob seed).  That secret is the input
//! keying material; the per-vault random salt is the HKDF salt; a fixed
//! versioned context string is the HKDF info.  The result is the 256-bit
//! AES-GCM key for the vault.
//!
//! Keys produced here are never written anywhere.  Every unlock runs a
//! fresh ceremony and re-derives the key.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use super::keys::VaultKey;
use crate::errors::{Result, VaultError};

/// Length of the per-vault salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// HKDF info string.  Bump the version suffix if the derivation ever changes.
pub const HKDF_INFO: &[u8] = b"passkey-vault/aead-key/v1";

/// Derive the vault's AEAD key from a credential-bound secret and the vault salt.
///
/// The same `(secret, salt)` pair always yields the same key.
pub fn derive_vault_key(secret: &[u8], salt: &[u8]) -> Result<VaultKey> {
    if secret.is_empty() {
        return Err(VaultError::KeyDerivationFailed(
            "credential secret is empty".into(),
        ));
    }

    let hk = Hkdf::<Sha256>::new(Some(salt), secret);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(HKDF_INFO, &mut okm)
        .map_err(|e| VaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    let key = VaultKey::new(okm);
    okm.zeroize();
    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
