//! Byte ⇄ text codec used for everything the vault writes to storage.
//!
//! All binary fields (salts, IVs, ciphertext, credential ids) are stored
//! as URL-safe base64 without padding.  Decoding also accepts padded
//! input so records written by other tools still load.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;

use crate::errors::{Result, VaultError};

/// Encode raw bytes as unpadded URL-safe base64.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode URL-safe base64 text (padded or unpadded) into bytes.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let trimmed = text.trim();
    let result = if trimmed.ends_with('=') {
        URL_SAFE.decode(trimmed)
    } else {
        URL_SAFE_NO_PAD.decode(trimmed)
    };
    result.map_err(|e| VaultError::SerializationError(format!("invalid base64url text: {e}")))
}

/// Decode text that must hold exactly `N` bytes.
pub fn decode_array<const N: usize>(text: &str) -> Result<[u8; N]> {
    let bytes = decode(text)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        VaultError::SerializationError(format!("expected {N} bytes, got {len}"))
    })
}

// ---------------------------------------------------------------------------
// Serde helpers for base64url-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

pub(crate) fn serialize_bytes<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&encode(data))
}

pub(crate) fn deserialize_bytes<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    decode(&s).map_err(serde::de::Error::custom)
}
