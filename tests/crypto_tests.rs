//! Integration tests for the vault crypto pipeline.

use passkey_vault::crypto::{
    decrypt, derive_vault_key, encrypt, generate_private_key, generate_salt, public_key_hex,
    IV_LEN, SALT_LEN,
};
use passkey_vault::errors::VaultError;
use passkey_vault::vault::secret::{associated_data, open, seal};
use passkey_vault::vault::SecretBundle;

// ---------------------------------------------------------------------------
// AEAD
// ---------------------------------------------------------------------------

#[test]
fn encrypt_decrypt_roundtrip_with_aad() {
    let key = [0xABu8; 32];
    let aad = b"passkey-vault:default:v1";
    let plaintext = b"{\"version\":1}";

    let (iv, ciphertext) = encrypt(&key, aad, plaintext).expect("encrypt should succeed");
    assert_eq!(iv.len(), IV_LEN);
    // 16-byte GCM tag appended.
    assert_eq!(ciphertext.len(), plaintext.len() + 16);

    let recovered = decrypt(&key, aad, &iv, &ciphertext).expect("decrypt should succeed");
    assert_eq!(recovered, plaintext);
}

#[test]
fn every_encryption_uses_a_fresh_iv() {
    let key = [0xCDu8; 32];
    let (iv1, ct1) = encrypt(&key, b"aad", b"same").unwrap();
    let (iv2, ct2) = encrypt(&key, b"aad", b"same").unwrap();
    assert_ne!(iv1, iv2);
    assert_ne!(ct1, ct2);
}

#[test]
fn decrypt_with_wrong_aad_is_integrity_error() {
    let key = [0x11u8; 32];
    let (iv, ct) = encrypt(&key, b"passkey-vault:a:v1", b"secret").unwrap();
    assert!(matches!(
        decrypt(&key, b"passkey-vault:b:v1", &iv, &ct),
        Err(VaultError::IntegrityError)
    ));
}

#[test]
fn decrypt_with_wrong_key_is_integrity_error() {
    let (iv, ct) = encrypt(&[1u8; 32], b"aad", b"secret").unwrap();
    assert!(matches!(
        decrypt(&[2u8; 32], b"aad", &iv, &ct),
        Err(VaultError::IntegrityError)
    ));
}

// ---------------------------------------------------------------------------
// HKDF
// ---------------------------------------------------------------------------

#[test]
fn vault_key_depends_on_secret_and_salt() {
    let salt = generate_salt();
    assert_eq!(salt.len(), SALT_LEN);

    let k1 = derive_vault_key(&[5u8; 32], &salt).unwrap();
    let k2 = derive_vault_key(&[5u8; 32], &salt).unwrap();
    let k3 = derive_vault_key(&[6u8; 32], &salt).unwrap();
    let k4 = derive_vault_key(&[5u8; 32], &generate_salt()).unwrap();

    assert_eq!(k1.as_bytes(), k2.as_bytes());
    assert_ne!(k1.as_bytes(), k3.as_bytes());
    assert_ne!(k1.as_bytes(), k4.as_bytes());
}

#[test]
fn empty_secret_is_rejected() {
    assert!(matches!(
        derive_vault_key(&[], &generate_salt()),
        Err(VaultError::KeyDerivationFailed(_))
    ));
}

// ---------------------------------------------------------------------------
// Sealing a bundle end to end
// ---------------------------------------------------------------------------

#[test]
fn sealed_bundle_opens_only_for_its_vault_id() {
    let salt = generate_salt();
    let key = derive_vault_key(&[9u8; 32], &salt).unwrap();
    let bundle = SecretBundle::new(*generate_private_key(), *generate_private_key());

    let envelope = seal(&key, "default", &bundle).unwrap();
    assert_eq!(envelope.iv.len(), IV_LEN);

    let opened = open(&key, "default", &envelope).unwrap();
    assert_eq!(opened, bundle);
    assert_eq!(opened.public_key_hex(), public_key_hex(bundle.primary_key()));

    assert!(matches!(
        open(&key, "work", &envelope),
        Err(VaultError::IntegrityError)
    ));
}

#[test]
fn associated_data_format() {
    assert_eq!(associated_data("default"), "passkey-vault:default:v1");
}

#[test]
fn rfc8032_public_key() {
    let secret: [u8; 32] =
        hex::decode("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")
            .unwrap()
            .try_into()
            .unwrap();
    assert_eq!(
        public_key_hex(&secret),
        "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
    );
}
