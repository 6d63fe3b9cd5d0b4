//! Cryptographic primitives for the passkey vault.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption with associated data (`encryption`)
//! - HKDF-SHA256 derivation of the vault key from a credential secret (`kdf`)
//! - Zeroizing key wrappers and Ed25519 helpers (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_vault_key, ...};
pub use encryption::{decrypt, encrypt, IV_LEN};
pub use kdf::{derive_vault_key, generate_salt, SALT_LEN};
pub use keys::{generate_private_key, public_key_hex, VaultKey, PRIVATE_KEY_LEN};
