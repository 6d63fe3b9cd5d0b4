//! `passkey-vault audit`: review lifecycle attempts.
//!
//! Usage:
//!   passkey-vault audit                  # last 50 attempts, all vaults
//!   passkey-vault audit --failures       # only failed attempts
//!   passkey-vault audit --since 7d       # attempts from the last 7 days
//!   passkey-vault --vault-id work audit  # one vault only

use chrono::{DateTime, TimeDelta, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::audit::{AuditEntry, AuditFilter, AuditLog};
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultError};

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>, failures: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    if !AuditLog::db_path(&ctx.vault_dir).exists() {
        output::info("No audit entries found.");
        return Ok(());
    }

    let filter = AuditFilter {
        limit: last,
        since: since.map(|s| parse_since(s, Utc::now())).transpose()?,
        // Without an explicit --vault-id, show every vault in the directory.
        vault_id: cli.vault_id.clone(),
        failures_only: failures,
    };
    let entries = AuditLog::open(&ctx.vault_dir)?.query(&filter)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);

    let failed = entries.iter().filter(|e| !e.succeeded()).count();
    if failed > 0 && !failures {
        output::warning(&format!(
            "{failed} failed attempt(s) above. Use --failures to list only those."
        ));
    }

    Ok(())
}

/// Resolve "7d", "24h" or "30m" to the instant that long before `now`.
fn parse_since(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let invalid = || {
        VaultError::CommandFailed(format!(
            "invalid duration '{input}', use a format like 7d, 24h, or 30m"
        ))
    };

    let Some(unit) = input.chars().last() else {
        return Err(invalid());
    };
    let amount: i64 = input[..input.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount < 0 {
        return Err(invalid());
    }

    let span = match unit {
        'd' => TimeDelta::try_days(amount),
        'h' => TimeDelta::try_hours(amount),
        'm' => TimeDelta::try_minutes(amount),
        _ => None,
    }
    .ok_or_else(invalid)?;

    now.checked_sub_signed(span).ok_or_else(invalid)
}

fn print_audit_table(entries: &[AuditEntry]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["When", "Vault", "Operation", "Result", "Public key", "Detail"]);

    for entry in entries {
        let result = match entry.error_kind.as_deref() {
            None => style("ok").green().to_string(),
            Some(kind) => style(kind).red().bold().to_string(),
        };
        table.add_row(vec![
            entry.at.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.vault_id.clone(),
            entry.operation.clone(),
            result,
            entry
                .public_key_hex
                .as_deref()
                .map_or_else(|| "-".to_string(), short_key),
            entry.detail.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", style(format!("{} audit entries:", entries.len())).bold());
    println!("{table}");
}

/// First and last 8 characters of a public key.
fn short_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 20 {
        return key.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{head}…{tail}")
}
