//! Credential provider: passkey enrollment and credential-bound secrets.
//!
//! The vault never sees the credential's private key.  It asks the
//! authenticator for a secret that only that credential can reproduce,
//! evaluated at the vault's salt, and feeds it to HKDF.
//!
//! Three platform mechanisms can produce such a secret.  They are tried
//! in order, moving on only when the previous one is reported as
//! unsupported:
//!
//! 1. WebAuthn PRF extension
//! 2. CTAP2 hmac-secret extension
//! 3. Large-blob storage holding a random seed chosen at enrollment
//!
//! - [`CredentialProvider`]: the `enroll` / `derive_secret` seam used by the vault
//! - [`webauthn::WebAuthnProvider`]: the fallback chain over a platform authenticator
//! - [`virtual_authenticator::VirtualAuthenticator`]: a software authenticator

pub mod virtual_authenticator;
pub mod webauthn;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::codec::{self, deserialize_bytes, serialize_bytes};
use crate::errors::Result;

pub use virtual_authenticator::{Capabilities, VirtualAuthenticator};
pub use webauthn::{
    CeremonyError, CreationOptions, PlatformAuthenticator, RelyingParty, WebAuthnProvider,
};

/// Opaque credential handle returned by the authenticator.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(
    #[serde(serialize_with = "serialize_bytes", deserialize_with = "deserialize_bytes")] Vec<u8>,
);

impl CredentialId {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse the base64url text form used in flags and records.
    pub fn from_text(text: &str) -> Result<Self> {
        codec::decode(text).map(Self)
    }

    /// The base64url text form.
    pub fn to_text(&self) -> String {
        codec::encode(&self.0)
    }
}

impl std::fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialId({})", self.to_text())
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Which platform mechanism produced a credential secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretMethod {
    Prf,
    HmacSecret,
    LargeBlob,
}

impl std::fmt::Display for SecretMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Prf => "prf",
            Self::HmacSecret => "hmac-secret",
            Self::LargeBlob => "large-blob",
        };
        f.write_str(name)
    }
}

/// A credential-bound secret, tagged with the mechanism that produced it.
pub struct DerivedSecret {
    method: SecretMethod,
    bytes: Zeroizing<Vec<u8>>,
}

impl DerivedSecret {
    pub fn new(method: SecretMethod, bytes: Zeroizing<Vec<u8>>) -> Self {
        Self { method, bytes }
    }

    pub fn method(&self) -> SecretMethod {
        self.method
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedSecret")
            .field("method", &self.method)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Why a secret is being requested.
///
/// Only matters for the large-blob fallback: enrollment writes a new
/// seed, unlock reads the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyPurpose {
    Enrollment,
    Unlock,
}

/// Per-call options for [`CredentialProvider::derive_secret`].
#[derive(Debug, Clone, Copy)]
pub struct DeriveOptions {
    pub purpose: CeremonyPurpose,
    /// Whether the large-blob seed may be used when neither PRF nor
    /// hmac-secret is available.
    pub allow_large_blob: bool,
}

impl DeriveOptions {
    pub fn enrollment() -> Self {
        Self {
            purpose: CeremonyPurpose::Enrollment,
            allow_large_blob: true,
        }
    }

    pub fn unlock() -> Self {
        Self {
            purpose: CeremonyPurpose::Unlock,
            allow_large_blob: true,
        }
    }

    pub fn with_large_blob(mut self, allow: bool) -> Self {
        self.allow_large_blob = allow;
        self
    }
}

/// Capability seam over the platform's credential ceremonies.
///
/// Every call is a user-presence ceremony; nothing is cached between
/// calls.
pub trait CredentialProvider {
    /// Create a new resident, user-verified credential.
    fn enroll(&self) -> Result<CredentialId>;

    /// Obtain the credential-bound secret for `salt`.
    fn derive_secret(
        &self,
        credential_id: &CredentialId,
        salt: &[u8],
        options: &DeriveOptions,
    ) -> Result<DerivedSecret>;
}

impl<P: CredentialProvider + ?Sized> CredentialProvider for &P {
    fn enroll(&self) -> Result<CredentialId> {
        (**self).enroll()
    }

    fn derive_secret(
        &self,
        credential_id: &CredentialId,
        salt: &[u8],
        options: &DeriveOptions,
    ) -> Result<DerivedSecret> {
        (**self).derive_secret(credential_id, salt, options)
    }
}
