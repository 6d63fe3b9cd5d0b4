//! Project configuration (`.passkey-vault.toml`).

pub mod settings;

pub use settings::Settings;
