//! `passkey-vault unlock`: run the unlock ceremony and verify the vault.
//!
//! The CLI process is short-lived, so the decrypted session lives only
//! until the command exits.  A successful unlock proves the passkey still
//! opens the vault and that the sealed key matches the stored public key.

use std::sync::Arc;

use ed25519_dalek::Signer;

#[cfg(feature = "audit-log")]
use crate::audit::{self, AuditEvent, Operation};
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultError};
use crate::vault::UnlockedVaultSession;

/// Message signed to show the unlocked key is usable.
const CHECK_MESSAGE: &[u8] = b"passkey-vault unlock check";

/// Execute the `unlock` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let controller = ctx.controller()?;

    let session = match controller.unlock().and_then(|s| prove(&s).map(|()| s)) {
        Ok(session) => session,
        Err(e) => {
            #[cfg(feature = "audit-log")]
            audit::log_audit(&ctx, AuditEvent::failed(Operation::Unlock, &ctx.vault_id, &e));
            controller.lock();
            return Err(e);
        }
    };

    output::success(&format!("Vault '{}' unlocked", session.vault_id()));
    output::info(&format!("Public key: {}", session.public_key_hex()));

    #[cfg(feature = "audit-log")]
    audit::log_audit(
        &ctx,
        AuditEvent::succeeded(Operation::Unlock, &ctx.vault_id)
            .with_public_key(Some(session.public_key_hex())),
    );

    controller.lock();
    Ok(())
}

/// Sign and strictly verify a fixed message with the unlocked key.
fn prove(session: &Arc<UnlockedVaultSession>) -> Result<()> {
    let signing_key = session.signing_key();
    let signature = signing_key.sign(CHECK_MESSAGE);
    signing_key
        .verifying_key()
        .verify_strict(CHECK_MESSAGE, &signature)
        .map_err(|_| VaultError::IntegrityError)
}
