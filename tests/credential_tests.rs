//! Integration tests for the credential secret fallback chain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use passkey_vault::credential::{
    Capabilities, CeremonyError, CredentialId, CredentialProvider, CreationOptions,
    DeriveOptions, PlatformAuthenticator, RelyingParty, SecretMethod, VirtualAuthenticator,
    WebAuthnProvider,
};
use passkey_vault::errors::VaultError;
use zeroize::Zeroizing;

fn provider(capabilities: Capabilities) -> WebAuthnProvider<Arc<VirtualAuthenticator>> {
    WebAuthnProvider::new(
        Arc::new(VirtualAuthenticator::new(capabilities)),
        RelyingParty::default(),
    )
}

// ---------------------------------------------------------------------------
// Fallback order with the virtual authenticator
// ---------------------------------------------------------------------------

#[test]
fn prf_is_preferred_when_available() {
    let p = provider(Capabilities::full());
    let cred = p.enroll().unwrap();
    let secret = p
        .derive_secret(&cred, &[7u8; 32], &DeriveOptions::enrollment())
        .unwrap();
    assert_eq!(secret.method(), SecretMethod::Prf);
    assert_eq!(secret.as_bytes().len(), 32);
}

#[test]
fn falls_back_to_hmac_secret_without_prf() {
    let p = provider(Capabilities {
        prf: false,
        ..Capabilities::full()
    });
    let cred = p.enroll().unwrap();
    let secret = p
        .derive_secret(&cred, &[7u8; 32], &DeriveOptions::unlock())
        .unwrap();
    assert_eq!(secret.method(), SecretMethod::HmacSecret);
}

#[test]
fn falls_back_to_large_blob_last() {
    let p = provider(Capabilities::only(SecretMethod::LargeBlob));
    let cred = p.enroll().unwrap();

    let enrolled = p
        .derive_secret(&cred, &[7u8; 32], &DeriveOptions::enrollment())
        .unwrap();
    assert_eq!(enrolled.method(), SecretMethod::LargeBlob);

    let unlocked = p
        .derive_secret(&cred, &[7u8; 32], &DeriveOptions::unlock())
        .unwrap();
    assert_eq!(unlocked.as_bytes(), enrolled.as_bytes());
}

#[test]
fn large_blob_unlock_without_seed_is_unavailable() {
    let p = provider(Capabilities::only(SecretMethod::LargeBlob));
    let cred = p.enroll().unwrap();
    assert!(matches!(
        p.derive_secret(&cred, &[7u8; 32], &DeriveOptions::unlock()),
        Err(VaultError::PrfUnavailable)
    ));
}

#[test]
fn no_mechanism_is_prf_unavailable() {
    let p = provider(Capabilities::none());
    let cred = p.enroll().unwrap();
    assert!(matches!(
        p.derive_secret(&cred, &[7u8; 32], &DeriveOptions::enrollment()),
        Err(VaultError::PrfUnavailable)
    ));
}

#[test]
fn prf_secret_is_deterministic_per_salt() {
    let p = provider(Capabilities::full());
    let cred = p.enroll().unwrap();
    let a = p
        .derive_secret(&cred, &[1u8; 32], &DeriveOptions::unlock())
        .unwrap();
    let b = p
        .derive_secret(&cred, &[1u8; 32], &DeriveOptions::unlock())
        .unwrap();
    let c = p
        .derive_secret(&cred, &[2u8; 32], &DeriveOptions::unlock())
        .unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
    assert_ne!(a.as_bytes(), c.as_bytes());
}

#[test]
fn unknown_credential_is_rejected() {
    let p = provider(Capabilities::full());
    let stranger = CredentialId::from_bytes(vec![9; 16]);
    assert!(matches!(
        p.derive_secret(&stranger, &[1u8; 32], &DeriveOptions::unlock()),
        Err(VaultError::CredentialRejected(_))
    ));
}

#[test]
fn credential_is_scoped_to_relying_party() {
    let auth = Arc::new(VirtualAuthenticator::new(Capabilities::full()));
    let home = WebAuthnProvider::new(Arc::clone(&auth), RelyingParty::default());
    let elsewhere = WebAuthnProvider::new(
        Arc::clone(&auth),
        RelyingParty {
            id: "evil.example".into(),
            ..RelyingParty::default()
        },
    );

    let cred = home.enroll().unwrap();
    assert!(elsewhere
        .derive_secret(&cred, &[1u8; 32], &DeriveOptions::unlock())
        .is_err());
}

#[test]
fn unavailable_platform_fails_enrollment() {
    let p = provider(Capabilities::unavailable());
    assert!(matches!(p.enroll(), Err(VaultError::PlatformUnsupported(_))));
}

#[test]
fn declined_presence_fails_enrollment() {
    let auth = VirtualAuthenticator::new(Capabilities::full()).with_presence(|_| false);
    let p = WebAuthnProvider::new(auth, RelyingParty::default());
    assert!(matches!(p.enroll(), Err(VaultError::CredentialRejected(_))));
}

// ---------------------------------------------------------------------------
// Fallback only on "unsupported"
// ---------------------------------------------------------------------------

/// Authenticator whose PRF step fails with a scripted error.
struct ScriptedPrf {
    prf_error: CeremonyError,
    hmac_calls: AtomicUsize,
}

impl PlatformAuthenticator for ScriptedPrf {
    fn is_available(&self) -> bool {
        true
    }

    fn create_credential(
        &self,
        _options: &CreationOptions,
    ) -> Result<CredentialId, CeremonyError> {
        Ok(CredentialId::from_bytes(vec![1; 16]))
    }

    fn evaluate_prf(
        &self,
        _rp_id: &str,
        _credential: &CredentialId,
        _salt: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CeremonyError> {
        Err(self.prf_error.clone())
    }

    fn evaluate_hmac_secret(
        &self,
        _rp_id: &str,
        _credential: &CredentialId,
        _salt: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CeremonyError> {
        self.hmac_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Zeroizing::new(vec![3; 32]))
    }

    fn read_large_blob(
        &self,
        _rp_id: &str,
        _credential: &CredentialId,
    ) -> Result<Option<Zeroizing<Vec<u8>>>, CeremonyError> {
        Ok(None)
    }

    fn write_large_blob(
        &self,
        _rp_id: &str,
        _credential: &CredentialId,
        _blob: &[u8],
    ) -> Result<(), CeremonyError> {
        Ok(())
    }
}

fn scripted(prf_error: CeremonyError) -> WebAuthnProvider<Arc<ScriptedPrf>> {
    WebAuthnProvider::new(
        Arc::new(ScriptedPrf {
            prf_error,
            hmac_calls: AtomicUsize::new(0),
        }),
        RelyingParty::default(),
    )
}

#[test]
fn cancelled_prf_does_not_fall_back() {
    let p = scripted(CeremonyError::NotAllowed("cancelled".into()));
    let cred = p.enroll().unwrap();
    assert!(matches!(
        p.derive_secret(&cred, &[1u8; 32], &DeriveOptions::unlock()),
        Err(VaultError::CredentialRejected(_))
    ));
    assert_eq!(p.authenticator().hmac_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_prf_does_not_fall_back() {
    let p = scripted(CeremonyError::Failed("transport error".into()));
    let cred = p.enroll().unwrap();
    assert!(p
        .derive_secret(&cred, &[1u8; 32], &DeriveOptions::unlock())
        .is_err());
    assert_eq!(p.authenticator().hmac_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unsupported_prf_falls_back_to_hmac_secret() {
    let p = scripted(CeremonyError::ExtensionUnsupported(SecretMethod::Prf));
    let cred = p.enroll().unwrap();
    let secret = p
        .derive_secret(&cred, &[1u8; 32], &DeriveOptions::unlock())
        .unwrap();
    assert_eq!(secret.method(), SecretMethod::HmacSecret);
    assert_eq!(p.authenticator().hmac_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn ceremony_errors_map_to_vault_errors() {
    assert!(matches!(
        VaultError::from(CeremonyError::ExtensionUnsupported(SecretMethod::Prf)),
        VaultError::PrfUnavailable
    ));
    assert!(matches!(
        VaultError::from(CeremonyError::Unavailable("no api".into())),
        VaultError::PlatformUnsupported(_)
    ));
    assert!(matches!(
        VaultError::from(CeremonyError::NotAllowed("timeout".into())),
        VaultError::CredentialRejected(_)
    ));
}
