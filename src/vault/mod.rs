//! Vault module: the sealed secret bundle and its lifecycle.
//!
//! This module provides:
//! - The persisted `VaultRecord` and its JSON form (`record`)
//! - The `SecretBundle` plaintext and AEAD seal/open (`secret`)
//! - Record and flag persistence behind `RecordStore` / `FlagStore` (`store`)
//! - The in-memory `SessionCache` and its observers (`session`)
//! - The `VaultController` state machine (`controller`)

pub mod controller;
pub mod record;
pub mod secret;
pub mod session;
pub mod store;

// Re-export the most commonly used items.
pub use controller::{
    flags, read_status, CreateOptions, CreatedVault, NoSessionCounters, SessionCounters,
    VaultController, VaultState, VaultStatus,
};
pub use record::{CipherEnvelope, VaultRecord, DEFAULT_VAULT_ID, RECORD_VERSION};
pub use secret::SecretBundle;
pub use session::{SessionCache, SessionObserver, SubscriptionId, UnlockedVaultSession};
pub use store::{FlagStore, MemoryStore, RecordStore, SqliteStore};
