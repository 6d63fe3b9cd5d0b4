//! AES-256-GCM authenticated encryption with associated data.
//!
//! Each call to `encrypt` generates a fresh random 12-byte IV and returns
//! it alongside the ciphertext; the vault record stores them as separate
//! fields.  The associated data is authenticated but not encrypted, so a
//! ciphertext only opens under the same AAD it was sealed with.

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM IV in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Encrypt `plaintext` under a 32-byte `key`, binding it to `aad`.
///
/// Returns `(iv, ciphertext || tag)`.
pub fn encrypt(key: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&nonce);
    Ok((iv, ciphertext))
}

/// Decrypt and authenticate data produced by `encrypt`.
///
/// Any failure (wrong key, wrong AAD, bad IV length, flipped bit) is
/// reported as `IntegrityError`.
pub fn decrypt(key: &[u8], aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_LEN {
        return Err(VaultError::IntegrityError);
    }
    let nonce = Nonce::from_slice(iv);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::IntegrityError)?;

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| VaultError::IntegrityError)
}
