use thiserror::Error;

/// All errors that can occur in the passkey vault.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Platform / credential errors ---
    #[error("Platform does not support passkey credentials: {0}")]
    PlatformUnsupported(String),

    #[error("Authenticator declined the request: {0}")]
    CredentialRejected(String),

    #[error("Authenticator cannot produce a credential-bound secret (no PRF, hmac-secret or large-blob support)")]
    PrfUnavailable,

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Integrity check failed: wrong credential, tampered vault, or mismatched vault id")]
    IntegrityError,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Vault errors ---
    #[error("Vault '{0}' not found")]
    VaultNotFound(String),

    #[error("Vault '{0}' already exists (delete it first)")]
    VaultAlreadyExists(String),

    #[error("Unsupported vault schema: {0}")]
    SchemaError(String),

    #[error("Legacy key is invalid: {0}")]
    InvalidLegacyKey(String),

    // --- Storage errors ---
    #[error("Vault storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Audit error: {0}")]
    AuditError(String),
}

impl VaultError {
    /// Short stable label for the error variant, as written to the audit log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlatformUnsupported(_) => "platform-unsupported",
            Self::CredentialRejected(_) => "credential-rejected",
            Self::PrfUnavailable => "prf-unavailable",
            Self::EncryptionFailed(_) => "encryption-failed",
            Self::IntegrityError => "integrity",
            Self::KeyDerivationFailed(_) => "key-derivation",
            Self::VaultNotFound(_) => "vault-not-found",
            Self::VaultAlreadyExists(_) => "vault-exists",
            Self::SchemaError(_) => "schema",
            Self::InvalidLegacyKey(_) => "invalid-legacy-key",
            Self::StorageUnavailable(_) => "storage-unavailable",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
            Self::SerializationError(_) => "serialization",
            Self::ConfigError(_) => "config",
            Self::CommandFailed(_) => "command-failed",
            Self::UserCancelled => "cancelled",
            Self::AuditError(_) => "audit",
        }
    }
}

/// Convenience type alias for vault results.
pub type Result<T> = std::result::Result<T, VaultError>;
