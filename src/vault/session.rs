//! Unlocked-vault session and the in-memory cache that holds it.
//!
//! A [`SessionCache`] is a single slot holding at most one
//! [`UnlockedVaultSession`], plus a registry of observers notified on
//! every unlock/lock transition.  It is an explicit value owned by the
//! caller and shared with the controller, so independent vaults (and
//! tests) never share ambient state.
//!
//! Nothing in here is ever serialized.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::secret::SecretBundle;
use crate::credential::CredentialId;
use crate::crypto::{keys, PRIVATE_KEY_LEN};

/// Decrypted vault contents held in memory while the vault is unlocked.
///
/// Key bytes are zeroized when the last reference is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct UnlockedVaultSession {
    #[zeroize(skip)]
    vault_id: String,
    #[zeroize(skip)]
    credential_id: CredentialId,
    #[zeroize(skip)]
    unlocked_at: DateTime<Utc>,
    primary_key: [u8; PRIVATE_KEY_LEN],
    secondary_key: [u8; PRIVATE_KEY_LEN],
    #[zeroize(skip)]
    public_key_hex: String,
}

impl UnlockedVaultSession {
    pub fn new(vault_id: &str, credential_id: CredentialId, bundle: &SecretBundle) -> Self {
        Self {
            vault_id: vault_id.to_string(),
            credential_id,
            unlocked_at: Utc::now(),
            primary_key: *bundle.primary_key(),
            secondary_key: *bundle.secondary_key(),
            public_key_hex: bundle.public_key_hex(),
        }
    }

    pub fn vault_id(&self) -> &str {
        &self.vault_id
    }

    pub fn credential_id(&self) -> &CredentialId {
        &self.credential_id
    }

    pub fn unlocked_at(&self) -> DateTime<Utc> {
        self.unlocked_at
    }

    pub fn primary_key(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.primary_key
    }

    pub fn secondary_key(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.secondary_key
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    /// Ed25519 signing key for the signing service.
    pub fn signing_key(&self) -> SigningKey {
        keys::signing_key(&self.primary_key)
    }
}

impl std::fmt::Debug for UnlockedVaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedVaultSession")
            .field("vault_id", &self.vault_id)
            .field("credential_id", &self.credential_id)
            .field("unlocked_at", &self.unlocked_at)
            .field("public_key_hex", &self.public_key_hex)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

/// Receives the cache's value on every transition.
///
/// `None` means locked.
pub trait SessionObserver: Send + Sync {
    fn on_session_change(&self, session: Option<&Arc<UnlockedVaultSession>>);
}

impl<F> SessionObserver for F
where
    F: Fn(Option<&Arc<UnlockedVaultSession>>) + Send + Sync,
{
    fn on_session_change(&self, session: Option<&Arc<UnlockedVaultSession>>) {
        self(session)
    }
}

/// Handle returned by [`SessionCache::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Arc<dyn SessionObserver>)>,
}

/// Memory-only slot for the current unlocked session.
#[derive(Default)]
pub struct SessionCache {
    slot: RwLock<Option<Arc<UnlockedVaultSession>>>,
    observers: Mutex<Observers>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current session, if unlocked.
    pub fn get(&self) -> Option<Arc<UnlockedVaultSession>> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the slot and notify observers.
    pub fn set(&self, session: Arc<UnlockedVaultSession>) {
        {
            let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
            *slot = Some(Arc::clone(&session));
        }
        debug!(vault_id = session.vault_id(), "session cached");
        self.notify(Some(&session));
    }

    /// Drop the cached session and notify observers.
    pub fn clear(&self) {
        let previous = self.slot.write().unwrap_or_else(|e| e.into_inner()).take();
        if previous.is_some() {
            debug!("session cleared");
        }
        drop(previous);
        self.notify(None);
    }

    /// Clear the slot only if it holds a session for `vault_id`.
    ///
    /// Returns `true` if a session was dropped.  Observers are only
    /// notified when the slot actually changed.
    pub fn clear_vault(&self, vault_id: &str) -> bool {
        let previous = {
            let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(current) if current.vault_id() == vault_id => slot.take(),
                _ => None,
            }
        };
        let Some(previous) = previous else {
            return false;
        };
        debug!(vault_id, "session cleared");
        drop(previous);
        self.notify(None);
        true
    }

    /// Register an observer.  It is called immediately with the current value.
    pub fn subscribe<O>(&self, observer: O) -> SubscriptionId
    where
        O: SessionObserver + 'static,
    {
        let observer: Arc<dyn SessionObserver> = Arc::new(observer);
        let id = {
            let mut observers = self.lock_observers();
            let id = SubscriptionId(observers.next_id);
            observers.next_id += 1;
            observers.entries.push((id, Arc::clone(&observer)));
            id
        };

        let current = self.get();
        deliver(observer.as_ref(), current.as_ref());
        id
    }

    /// Remove an observer.  Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.lock_observers();
        let before = observers.entries.len();
        observers.entries.retain(|(entry_id, _)| *entry_id != id);
        observers.entries.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.lock_observers().entries.len()
    }

    fn lock_observers(&self) -> MutexGuard<'_, Observers> {
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Call every observer outside the lock, so observers may read the
    /// cache or (un)subscribe from inside the callback.
    fn notify(&self, session: Option<&Arc<UnlockedVaultSession>>) {
        let snapshot: Vec<Arc<dyn SessionObserver>> = self
            .lock_observers()
            .entries
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();

        for observer in snapshot {
            deliver(observer.as_ref(), session);
        }
    }
}

/// A panicking observer is logged and skipped.
fn deliver(observer: &dyn SessionObserver, session: Option<&Arc<UnlockedVaultSession>>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.on_session_change(session)));
    if outcome.is_err() {
        warn!("session observer panicked; continuing with remaining observers");
    }
}
