//! `passkey-vault version`: display version and build details.

use console::style;

use crate::errors::Result;
use crate::vault::{secret::BUNDLE_VERSION, RECORD_VERSION};

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    println!("passkey-vault {current}");
    println!(
        "  {} record v{RECORD_VERSION}, bundle v{BUNDLE_VERSION}",
        style("formats:").dim()
    );
    println!(
        "  {} {}",
        style("audit log:").dim(),
        if cfg!(feature = "audit-log") {
            style("enabled").green()
        } else {
            style("disabled").yellow()
        }
    );

    Ok(())
}
