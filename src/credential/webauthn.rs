//! The secret-derivation fallback chain over a platform authenticator.
//!
//! [`PlatformAuthenticator`] mirrors the individual WebAuthn / CTAP2
//! ceremonies one-to-one.  [`WebAuthnProvider`] turns those into the
//! vault's [`CredentialProvider`]: it enrolls credentials with the
//! extensions the vault needs and walks PRF → hmac-secret → large-blob,
//! stepping down only on [`CeremonyError::ExtensionUnsupported`].

use std::sync::Arc;

use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::{
    CeremonyPurpose, CredentialId, CredentialProvider, DeriveOptions, DerivedSecret, SecretMethod,
};
use crate::errors::{Result, VaultError};

/// Length of the random seed written to the large blob at enrollment.
const LARGE_BLOB_SEED_LEN: usize = 32;

/// Outcome of a single failed platform ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeremonyError {
    /// The authenticator does not implement the requested extension.
    /// This is the only failure that moves the fallback chain forward.
    ExtensionUnsupported(SecretMethod),

    /// The user or platform declined (cancelled prompt, timeout,
    /// unknown credential).
    NotAllowed(String),

    /// The platform has no credential API at all.
    Unavailable(String),

    /// Anything else the platform reported.
    Failed(String),
}

impl From<CeremonyError> for VaultError {
    fn from(err: CeremonyError) -> Self {
        match err {
            CeremonyError::ExtensionUnsupported(_) => VaultError::PrfUnavailable,
            CeremonyError::NotAllowed(msg) | CeremonyError::Failed(msg) => {
                VaultError::CredentialRejected(msg)
            }
            CeremonyError::Unavailable(msg) => VaultError::PlatformUnsupported(msg),
        }
    }
}

/// Relying party and user the credentials are created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
    pub user_name: String,
}

impl Default for RelyingParty {
    fn default() -> Self {
        Self {
            id: "localhost".into(),
            name: "Passkey Vault".into(),
            user_name: "vault".into(),
        }
    }
}

/// Parameters of a credential creation ceremony.
///
/// The vault always asks for a resident key with user verification
/// required, and requests every extension the fallback chain can use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationOptions {
    pub rp_id: String,
    pub rp_name: String,
    pub user_id: Vec<u8>,
    pub user_name: String,
    pub resident_key: bool,
    pub user_verification_required: bool,
    pub request_prf: bool,
    pub request_hmac_secret: bool,
    pub request_large_blob: bool,
}

/// One-to-one model of the platform's credential ceremonies.
///
/// Implementations report a missing extension with
/// `CeremonyError::ExtensionUnsupported` and never with a generic error,
/// so the provider can tell "not supported" from "failed".
pub trait PlatformAuthenticator {
    /// Whether the platform exposes public-key credentials at all.
    fn is_available(&self) -> bool;

    fn create_credential(
        &self,
        options: &CreationOptions,
    ) -> std::result::Result<CredentialId, CeremonyError>;

    /// Assertion evaluating the PRF extension at `salt`.
    fn evaluate_prf(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        salt: &[u8],
    ) -> std::result::Result<Zeroizing<Vec<u8>>, CeremonyError>;

    /// Assertion evaluating the hmac-secret extension at `salt`.
    fn evaluate_hmac_secret(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        salt: &[u8],
    ) -> std::result::Result<Zeroizing<Vec<u8>>, CeremonyError>;

    /// Assertion reading the credential's large blob.
    fn read_large_blob(
        &self,
        rp_id: &str,
        credential: &CredentialId,
    ) -> std::result::Result<Option<Zeroizing<Vec<u8>>>, CeremonyError>;

    /// Assertion writing the credential's large blob.
    fn write_large_blob(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        blob: &[u8],
    ) -> std::result::Result<(), CeremonyError>;
}

impl<A: PlatformAuthenticator + ?Sized> PlatformAuthenticator for Arc<A> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn create_credential(
        &self,
        options: &CreationOptions,
    ) -> std::result::Result<CredentialId, CeremonyError> {
        (**self).create_credential(options)
    }

    fn evaluate_prf(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        salt: &[u8],
    ) -> std::result::Result<Zeroizing<Vec<u8>>, CeremonyError> {
        (**self).evaluate_prf(rp_id, credential, salt)
    }

    fn evaluate_hmac_secret(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        salt: &[u8],
    ) -> std::result::Result<Zeroizing<Vec<u8>>, CeremonyError> {
        (**self).evaluate_hmac_secret(rp_id, credential, salt)
    }

    fn read_large_blob(
        &self,
        rp_id: &str,
        credential: &CredentialId,
    ) -> std::result::Result<Option<Zeroizing<Vec<u8>>>, CeremonyError> {
        (**self).read_large_blob(rp_id, credential)
    }

    fn write_large_blob(
        &self,
        rp_id: &str,
        credential: &CredentialId,
        blob: &[u8],
    ) -> std::result::Result<(), CeremonyError> {
        (**self).write_large_blob(rp_id, credential, blob)
    }
}

/// [`CredentialProvider`] backed by a [`PlatformAuthenticator`].
pub struct WebAuthnProvider<A> {
    authenticator: A,
    relying_party: RelyingParty,
}

impl<A: PlatformAuthenticator> WebAuthnProvider<A> {
    pub fn new(authenticator: A, relying_party: RelyingParty) -> Self {
        Self {
            authenticator,
            relying_party,
        }
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    pub fn relying_party(&self) -> &RelyingParty {
        &self.relying_party
    }

    /// Try one extension step.  `Ok(None)` means "unsupported, move on".
    fn attempt(
        method: SecretMethod,
        outcome: std::result::Result<Zeroizing<Vec<u8>>, CeremonyError>,
    ) -> Result<Option<DerivedSecret>> {
        match outcome {
            Ok(bytes) => Ok(Some(DerivedSecret::new(method, bytes))),
            Err(CeremonyError::ExtensionUnsupported(_)) => {
                debug!(%method, "extension unsupported, falling back");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn large_blob_secret(
        &self,
        credential_id: &CredentialId,
        purpose: CeremonyPurpose,
    ) -> Result<DerivedSecret> {
        let rp_id = self.relying_party.id.as_str();
        match purpose {
            CeremonyPurpose::Enrollment => {
                let mut seed = Zeroizing::new(vec![0u8; LARGE_BLOB_SEED_LEN]);
                rand::rng().fill_bytes(seed.as_mut_slice());

                match self
                    .authenticator
                    .write_large_blob(rp_id, credential_id, &seed)
                {
                    Ok(()) => {}
                    Err(CeremonyError::ExtensionUnsupported(_)) => {
                        return Err(VaultError::PrfUnavailable)
                    }
                    Err(e) => return Err(e.into()),
                }

                // Second interaction: read back to confirm the write landed.
                let stored = self.read_blob(credential_id)?;
                if !bool::from(stored.as_slice().ct_eq(seed.as_slice())) {
                    warn!("large blob read-back did not match the written seed");
                    return Err(VaultError::PrfUnavailable);
                }
                Ok(DerivedSecret::new(SecretMethod::LargeBlob, seed))
            }
            CeremonyPurpose::Unlock => {
                let stored = self.read_blob(credential_id)?;
                Ok(DerivedSecret::new(SecretMethod::LargeBlob, stored))
            }
        }
    }

    fn read_blob(&self, credential_id: &CredentialId) -> Result<Zeroizing<Vec<u8>>> {
        match self
            .authenticator
            .read_large_blob(&self.relying_party.id, credential_id)
        {
            Ok(Some(blob)) if !blob.is_empty() => Ok(blob),
            Ok(_) => {
                warn!("credential has no large blob seed");
                Err(VaultError::PrfUnavailable)
            }
            Err(CeremonyError::ExtensionUnsupported(_)) => Err(VaultError::PrfUnavailable),
            Err(e) => Err(e.into()),
        }
    }
}

impl<A: PlatformAuthenticator> CredentialProvider for WebAuthnProvider<A> {
    fn enroll(&self) -> Result<CredentialId> {
        if !self.authenticator.is_available() {
            return Err(VaultError::PlatformUnsupported(
                "no platform authenticator is available".into(),
            ));
        }

        let mut user_id = vec![0u8; 16];
        rand::rng().fill_bytes(&mut user_id);

        let options = CreationOptions {
            rp_id: self.relying_party.id.clone(),
            rp_name: self.relying_party.name.clone(),
            user_id,
            user_name: self.relying_party.user_name.clone(),
            resident_key: true,
            user_verification_required: true,
            request_prf: true,
            request_hmac_secret: true,
            request_large_blob: true,
        };

        let credential = self.authenticator.create_credential(&options)?;
        info!(credential = %credential, rp = %options.rp_id, "enrolled passkey credential");
        Ok(credential)
    }

    fn derive_secret(
        &self,
        credential_id: &CredentialId,
        salt: &[u8],
        options: &DeriveOptions,
    ) -> Result<DerivedSecret> {
        let rp_id = self.relying_party.id.as_str();

        let prf = self.authenticator.evaluate_prf(rp_id, credential_id, salt);
        if let Some(secret) = Self::attempt(SecretMethod::Prf, prf)? {
            return Ok(secret);
        }

        let hmac = self
            .authenticator
            .evaluate_hmac_secret(rp_id, credential_id, salt);
        if let Some(secret) = Self::attempt(SecretMethod::HmacSecret, hmac)? {
            return Ok(secret);
        }

        if !options.allow_large_blob {
            return Err(VaultError::PrfUnavailable);
        }

        warn!("neither PRF nor hmac-secret is supported, using large-blob seed");
        self.large_blob_secret(credential_id, options.purpose)
    }
}
