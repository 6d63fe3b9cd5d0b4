//! `passkey-vault delete`: remove the vault record and its flags.

use dialoguer::Confirm;

#[cfg(feature = "audit-log")]
use crate::audit::{self, AuditEvent, Operation};
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultError};
use crate::vault::{RecordStore, VaultState};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, force: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let controller = ctx.controller()?;

    if controller.state()? == VaultState::NoVault {
        output::info(&format!("No vault '{}' to delete.", ctx.vault_id));
        return Ok(());
    }
    // A damaged record has no readable key; the delete still goes ahead.
    let public_key = match controller.store().get(&ctx.vault_id) {
        Ok(record) => record.map(|r| r.public_key_hex),
        Err(_) => None,
    };

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete vault '{}'? The sealed key cannot be recovered.",
                ctx.vault_id
            ))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    if let Err(e) = controller.delete() {
        #[cfg(feature = "audit-log")]
        audit::log_audit(&ctx, AuditEvent::failed(Operation::Delete, &ctx.vault_id, &e));
        return Err(e);
    }

    #[cfg(feature = "audit-log")]
    audit::log_audit(
        &ctx,
        AuditEvent::succeeded(Operation::Delete, &ctx.vault_id)
            .with_public_key(public_key.as_deref()),
    );
    #[cfg(not(feature = "audit-log"))]
    let _ = public_key;

    output::success(&format!("Deleted vault '{}'", ctx.vault_id));

    Ok(())
}
