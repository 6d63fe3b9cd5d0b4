//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::{VaultState, VaultStatus};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print the vault state and its public flags as a two-column table.
pub fn print_status_table(vault_id: &str, state: VaultState, status: &VaultStatus) {
    let state_cell = match state {
        VaultState::NoVault => style(state.to_string()).dim().to_string(),
        VaultState::Locked => style(state.to_string()).yellow().to_string(),
        VaultState::Unlocked => style(state.to_string()).green().to_string(),
    };

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Vault id".to_string(), vault_id.to_string()]);
    table.add_row(vec!["State".to_string(), state_cell]);
    table.add_row(vec!["Enabled".to_string(), status.enabled.to_string()]);
    table.add_row(vec![
        "Active vault".to_string(),
        status.active_vault_id.clone().unwrap_or_else(|| "-".into()),
    ]);
    table.add_row(vec![
        "Credential".to_string(),
        status.credential_id.clone().unwrap_or_else(|| "-".into()),
    ]);
    table.add_row(vec![
        "Public key".to_string(),
        status.public_key_hex.clone().unwrap_or_else(|| "-".into()),
    ]);
    if status.legacy_key_present {
        table.add_row(vec![
            "Legacy key".to_string(),
            style("present (run `passkey-vault init --migrate`)")
                .yellow()
                .to_string(),
        ]);
    }

    println!("{table}");
}
