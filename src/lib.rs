#[cfg(feature = "audit-log")]
pub mod audit;
pub mod cli;
pub mod codec;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod errors;
pub mod logging;
pub mod vault;
