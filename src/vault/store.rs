//! Persistent vault storage.
//!
//! Two kinds of data live here:
//!
//! - **Vault records** ([`RecordStore`]): one encrypted [`VaultRecord`] per
//!   vault id.  A write replaces the whole record in one statement, so a
//!   reader sees either the old record or the new one, never a mix.
//! - **Flags** ([`FlagStore`]): plain key/value strings with no secret
//!   content, for status checks that must not trigger a ceremony.
//!
//! [`SqliteStore`] keeps both in `<vault_dir>/vault.db`.  [`MemoryStore`]
//! keeps them in process memory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use super::record::VaultRecord;
use crate::errors::{Result, VaultError};

/// File name of the vault database inside the vault directory.
pub const DB_FILE_NAME: &str = "vault.db";

/// Keyed store of encrypted vault records.
pub trait RecordStore {
    fn get(&self, vault_id: &str) -> Result<Option<VaultRecord>>;

    /// Whether a row exists for `vault_id`.  The stored JSON is not
    /// parsed, so an unreadable record still counts.
    fn contains(&self, vault_id: &str) -> Result<bool>;

    /// Insert or replace the record with `record.id`.
    fn put(&self, record: &VaultRecord) -> Result<()>;

    /// Remove the record.  Removing a missing record is not an error.
    fn delete(&self, vault_id: &str) -> Result<()>;
}

/// Plain key/value flags.
pub trait FlagStore {
    fn get_flag(&self, key: &str) -> Result<Option<String>>;
    fn set_flag(&self, key: &str, value: &str) -> Result<()>;
    fn remove_flag(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// SQLite-backed record and flag store.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) `<vault_dir>/vault.db`.
    pub fn open(vault_dir: &Path) -> Result<Self> {
        if !vault_dir.exists() {
            fs::create_dir_all(vault_dir)?;
        }
        let db_path = vault_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path).map_err(|e| {
            VaultError::StorageUnavailable(format!("cannot open {}: {e}", db_path.display()))
        })?;

        // Owner-only: the file holds ciphertext, but also the credential id.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&db_path, perms);
        }

        let store = Self {
            conn,
            path: Some(db_path),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// A private in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VaultError::StorageUnavailable(format!("in-memory database: {e}")))?;
        let store = Self { conn, path: None };
        store.init_schema()?;
        Ok(store)
    }

    /// Path of the database file, if it is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS vault_records (
                    id            TEXT PRIMARY KEY,
                    record        TEXT NOT NULL,
                    updated_at_ms INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS vault_flags (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(|e| VaultError::StorageUnavailable(format!("schema setup: {e}")))
    }
}

fn storage_err(context: &str) -> impl FnOnce(rusqlite::Error) -> VaultError + '_ {
    move |e| VaultError::Storage(format!("{context}: {e}"))
}

impl RecordStore for SqliteStore {
    fn get(&self, vault_id: &str) -> Result<Option<VaultRecord>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT record FROM vault_records WHERE id = ?1",
                [vault_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err("read vault record"))?;

        json.map(|j| VaultRecord::from_json(&j)).transpose()
    }

    fn contains(&self, vault_id: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM vault_records WHERE id = ?1)",
                [vault_id],
                |row| row.get(0),
            )
            .map_err(storage_err("look up vault record"))
    }

    fn put(&self, record: &VaultRecord) -> Result<()> {
        record.validate()?;
        let json = record.to_json()?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO vault_records (id, record, updated_at_ms)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![record.id, json, record.updated_at_ms],
            )
            .map_err(storage_err("write vault record"))?;
        debug!(vault_id = %record.id, "vault record written");
        Ok(())
    }

    fn delete(&self, vault_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM vault_records WHERE id = ?1", [vault_id])
            .map_err(storage_err("delete vault record"))?;
        debug!(vault_id, "vault record deleted");
        Ok(())
    }
}

impl FlagStore for SqliteStore {
    fn get_flag(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM vault_flags WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err("read flag"))
    }

    fn set_flag(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO vault_flags (key, value) VALUES (?1, ?2)",
                [key, value],
            )
            .map_err(storage_err("write flag"))?;
        Ok(())
    }

    fn remove_flag(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM vault_flags WHERE key = ?1", [key])
            .map_err(storage_err("remove flag"))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// In-memory record and flag store.
///
/// Records are kept in their serialized form so reads go through the
/// same parsing and validation as the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
    flags: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `StorageUnavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw stored JSON of a record.
    pub fn raw_record(&self, vault_id: &str) -> Option<String> {
        lock(&self.records).get(vault_id).cloned()
    }

    /// Overwrite the raw stored JSON of a record, bypassing validation.
    pub fn set_raw_record(&self, vault_id: &str, json: &str) {
        lock(&self.records).insert(vault_id.to_string(), json.to_string());
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VaultError::StorageUnavailable(
                "memory store is read-only".into(),
            ));
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl RecordStore for MemoryStore {
    fn get(&self, vault_id: &str) -> Result<Option<VaultRecord>> {
        lock(&self.records)
            .get(vault_id)
            .map(|json| VaultRecord::from_json(json))
            .transpose()
    }

    fn contains(&self, vault_id: &str) -> Result<bool> {
        Ok(lock(&self.records).contains_key(vault_id))
    }

    fn put(&self, record: &VaultRecord) -> Result<()> {
        self.check_writable()?;
        record.validate()?;
        let json = record.to_json()?;
        lock(&self.records).insert(record.id.clone(), json);
        Ok(())
    }

    fn delete(&self, vault_id: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.records).remove(vault_id);
        Ok(())
    }
}

impl FlagStore for MemoryStore {
    fn get_flag(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.flags).get(key).cloned())
    }

    fn set_flag(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.flags).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_flag(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.flags).remove(key);
        Ok(())
    }
}

macro_rules! forward_store {
    ($wrapper:ty) => {
        impl<S: RecordStore + ?Sized> RecordStore for $wrapper {
            fn get(&self, vault_id: &str) -> Result<Option<VaultRecord>> {
                (**self).get(vault_id)
            }
            fn contains(&self, vault_id: &str) -> Result<bool> {
                (**self).contains(vault_id)
            }
            fn put(&self, record: &VaultRecord) -> Result<()> {
                (**self).put(record)
            }
            fn delete(&self, vault_id: &str) -> Result<()> {
                (**self).delete(vault_id)
            }
        }

        impl<S: FlagStore + ?Sized> FlagStore for $wrapper {
            fn get_flag(&self, key: &str) -> Result<Option<String>> {
                (**self).get_flag(key)
            }
            fn set_flag(&self, key: &str, value: &str) -> Result<()> {
                (**self).set_flag(key, value)
            }
            fn remove_flag(&self, key: &str) -> Result<()> {
                (**self).remove_flag(key)
            }
        }
    };
}

forward_store!(&S);
forward_store!(std::sync::Arc<S>);
