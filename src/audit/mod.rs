//! Audit trail of vault lifecycle attempts.
//!
//! Every `init`, `unlock` and `delete` attempt leaves one row in
//! `<vault_dir>/audit.db`, whether it succeeded or not.  A failed attempt
//! carries the error kind (`integrity`, `credential-rejected`,
//! `prf-unavailable`, ...), so a run of integrity failures or declined
//! prompts stands out when reviewing the log.  Rows never hold key
//! material, only the vault id and the public identifier.
//!
//! Writing is best effort: [`log_audit`] never fails the command that
//! produced the event.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row};
use tracing::debug;

use crate::cli::Context;
use crate::errors::{Result, VaultError};

/// File name of the audit database inside the vault directory.
pub const AUDIT_DB_FILE: &str = "audit.db";

/// Audited lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    Unlock,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Unlock => "unlock",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt, about to be written.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    operation: Operation,
    vault_id: &'a str,
    error_kind: Option<&'static str>,
    public_key_hex: Option<&'a str>,
    detail: Option<String>,
}

impl<'a> AuditEvent<'a> {
    pub fn succeeded(operation: Operation, vault_id: &'a str) -> Self {
        Self {
            operation,
            vault_id,
            error_kind: None,
            public_key_hex: None,
            detail: None,
        }
    }

    pub fn failed(operation: Operation, vault_id: &'a str, error: &VaultError) -> Self {
        Self {
            error_kind: Some(error.kind()),
            ..Self::succeeded(operation, vault_id)
        }
    }

    pub fn with_public_key(mut self, public_key_hex: Option<&'a str>) -> Self {
        self.public_key_hex = public_key_hex;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A stored row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub at: DateTime<Utc>,
    pub vault_id: String,
    pub operation: String,
    /// `None` when the attempt succeeded.
    pub error_kind: Option<String>,
    pub public_key_hex: Option<String>,
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn succeeded(&self) -> bool {
        self.error_kind.is_none()
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let at_ms: i64 = row.get(1)?;
        Ok(Self {
            id: row.get(0)?,
            at: Utc
                .timestamp_millis_opt(at_ms)
                .single()
                .unwrap_or_default(),
            vault_id: row.get(2)?,
            operation: row.get(3)?,
            error_kind: row.get(4)?,
            public_key_hex: row.get(5)?,
            detail: row.get(6)?,
        })
    }
}

/// Which rows [`AuditLog::query`] returns.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub limit: usize,
    /// Only rows at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only rows for this vault id.
    pub vault_id: Option<String>,
    pub failures_only: bool,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            limit: 50,
            since: None,
            vault_id: None,
            failures_only: false,
        }
    }
}

/// SQLite-backed audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) `<vault_dir>/audit.db`.
    pub fn open(vault_dir: &Path) -> Result<Self> {
        let db_path = Self::db_path(vault_dir);
        let conn = Connection::open(&db_path)
            .map_err(|e| VaultError::AuditError(format!("cannot open {}: {e}", db_path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&db_path, std::fs::Permissions::from_mode(0o600));
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vault_audit (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                at_ms       INTEGER NOT NULL,
                vault_id    TEXT NOT NULL,
                operation   TEXT NOT NULL,
                error_kind  TEXT,
                public_key  TEXT,
                detail      TEXT
            );
            CREATE INDEX IF NOT EXISTS vault_audit_at ON vault_audit (at_ms);",
        )
        .map_err(|e| VaultError::AuditError(format!("schema setup: {e}")))?;

        Ok(Self { conn })
    }

    pub fn db_path(vault_dir: &Path) -> PathBuf {
        vault_dir.join(AUDIT_DB_FILE)
    }

    pub fn record(&self, event: &AuditEvent<'_>) -> Result<()> {
        self.record_at(event, Utc::now())
    }

    fn record_at(&self, event: &AuditEvent<'_>, at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO vault_audit (at_ms, vault_id, operation, error_kind, public_key, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    at.timestamp_millis(),
                    event.vault_id,
                    event.operation.as_str(),
                    event.error_kind,
                    event.public_key_hex,
                    event.detail,
                ],
            )
            .map_err(|e| VaultError::AuditError(format!("write: {e}")))?;
        Ok(())
    }

    /// Rows matching `filter`, most recent first.
    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let since_ms = filter.since.map_or(i64::MIN, |t| t.timestamp_millis());
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, at_ms, vault_id, operation, error_kind, public_key, detail
                 FROM vault_audit
                 WHERE at_ms >= ?1
                   AND (?2 IS NULL OR vault_id = ?2)
                   AND (?3 = 0 OR error_kind IS NOT NULL)
                 ORDER BY id DESC
                 LIMIT ?4",
            )
            .map_err(|e| VaultError::AuditError(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(
                params![since_ms, filter.vault_id, filter.failures_only, limit],
                AuditEntry::from_row,
            )
            .map_err(|e| VaultError::AuditError(format!("query: {e}")))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| VaultError::AuditError(format!("row parse: {e}")))
    }
}

/// Record `event` in the selected vault directory.  Never fails the
/// calling command.
pub fn log_audit(ctx: &Context, event: AuditEvent<'_>) {
    let written = AuditLog::open(&ctx.vault_dir).and_then(|log| log.record(&event));
    if let Err(e) = written {
        debug!(error = %e, operation = %event.operation, "audit write skipped");
    }
}
