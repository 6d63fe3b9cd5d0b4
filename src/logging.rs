//! Diagnostic logging setup for the binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! left to `main`.  Output goes to stderr so it never mixes with command
//! output such as completion scripts.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive string.
pub const LOG_ENV: &str = "PASSKEY_VAULT_LOG";

/// Filter used when `PASSKEY_VAULT_LOG` is unset or invalid.
fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("passkey_vault=debug,warn")
    } else {
        EnvFilter::new("warn")
    }
}

/// Build the filter: `--verbose` wins, then `PASSKEY_VAULT_LOG`, then `warn`.
pub fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        return default_filter(true);
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| default_filter(false))
}

/// Install the global subscriber.  Calling it twice is harmless.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_filter_enables_debug() {
        assert!(filter(true).to_string().contains("passkey_vault=debug"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(false);
        init(true);
    }
}
