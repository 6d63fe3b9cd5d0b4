//! Key material wrappers.
//!
//! - [`VaultKey`]: the HKDF-derived AEAD key, zeroized on drop.
//! - Ed25519 helpers for the primary signing key held inside the vault.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::kdf::KEY_LEN;

/// Length of an Ed25519 private key seed and of the secondary key.
pub const PRIVATE_KEY_LEN: usize = 32;

/// A 32-byte AEAD key that zeroes its memory when dropped.
///
/// Only ever lives for the duration of a seal or open.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    bytes: [u8; KEY_LEN],
}

impl VaultKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (to build the cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// Generate 32 random bytes of private key material.
pub fn generate_private_key() -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
    let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    rand::rng().fill_bytes(bytes.as_mut());
    bytes
}

/// Rebuild the Ed25519 signing key from its 32-byte seed.
pub fn signing_key(private_key: &[u8; PRIVATE_KEY_LEN]) -> SigningKey {
    SigningKey::from_bytes(private_key)
}

/// Hex-encoded Ed25519 public key for a private key seed.
///
/// This is the vault's public identifier (`publicKeyHex`).
pub fn public_key_hex(private_key: &[u8; PRIVATE_KEY_LEN]) -> String {
    let verifying_key: VerifyingKey = signing_key(private_key).verifying_key();
    hex::encode(verifying_key.to_bytes())
}
