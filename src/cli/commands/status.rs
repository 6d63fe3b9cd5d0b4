//! `passkey-vault status`: show vault state from public flags only.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;
use crate::vault::{read_status, RecordStore, VaultState};

/// Execute the `status` command.  Never triggers a passkey prompt.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let store = ctx.open_store()?;

    let status = read_status(&store)?;
    let state = if store.contains(&ctx.vault_id)? {
        VaultState::Locked
    } else {
        VaultState::NoVault
    };

    output::print_status_table(&ctx.vault_id, state, &status);

    if state == VaultState::NoVault {
        output::tip("Run `passkey-vault init` to create a vault.");
    }

    Ok(())
}
