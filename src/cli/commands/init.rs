//! `passkey-vault init`: enroll a passkey and create the vault.

use std::path::Path;

#[cfg(feature = "audit-log")]
use crate::audit::{self, AuditEvent, Operation};
use crate::cli::gitignore::{self as ignore, IgnoreOutcome};
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultError};
use crate::vault::{CreateOptions, VaultState};

/// Execute the `init` command.
pub fn execute(cli: &Cli, migrate: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let controller = ctx.controller()?;

    // 1. Refuse early so the user is not asked to touch the passkey for nothing.
    let status = controller.status()?;
    if controller.state()? != VaultState::NoVault {
        output::tip("Run `passkey-vault delete` first to start over.");
        return Err(VaultError::VaultAlreadyExists(ctx.vault_id));
    }
    if !migrate && status.legacy_key_present {
        output::warning("A legacy plaintext key exists and will be left in place.");
        output::tip("Run `passkey-vault init --migrate` to move it into the vault instead.");
    }

    // 2. Enroll, derive, seal, persist.
    output::info("Creating a passkey for this vault...");
    let created = match controller.create(CreateOptions {
        migrate_legacy: migrate,
    }) {
        Ok(created) => created,
        Err(e) => {
            #[cfg(feature = "audit-log")]
            audit::log_audit(&ctx, AuditEvent::failed(Operation::Init, &ctx.vault_id, &e));
            return Err(e);
        }
    };
    let public_key = created.session.public_key_hex();

    output::success(&format!(
        "Vault '{}' created at {}",
        ctx.vault_id,
        ctx.vault_dir.display()
    ));
    output::info(&format!("Public key: {public_key}"));
    output::info(&format!("Secret source: {}", created.secret_method));
    if created.migrated {
        output::success("Legacy key moved into the vault and erased from plaintext storage.");
    } else if migrate {
        output::info("No legacy key found; generated a new signing key.");
    }

    // 3. Keep the vault directory out of version control.
    let vault_dir = ctx.settings.vault_dir.as_str();
    if Path::new(vault_dir).is_relative()
        && ignore::ensure_ignored(&ctx.project_dir, vault_dir) == IgnoreOutcome::Added
    {
        output::info(&format!("Added '{vault_dir}/' to .gitignore"));
    }

    // 4. Audit log.
    #[cfg(feature = "audit-log")]
    audit::log_audit(
        &ctx,
        AuditEvent::succeeded(Operation::Init, &ctx.vault_id)
            .with_public_key(Some(public_key))
            .with_detail(format!(
                "method={}, migrated={}",
                created.secret_method, created.migrated
            )),
    );

    output::tip("Run `passkey-vault unlock` to unlock the vault with your passkey.");

    Ok(())
}
