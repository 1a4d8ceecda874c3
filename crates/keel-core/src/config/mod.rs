//! # Keel Configuration
//!
//! - **[`Parameters`]**: the startup parameter map handed unchanged to every
//!   plugin's `initialize`. Values are JSON values; typically parsed from
//!   command-line tokens (`-foo 32` becomes `"foo": 32`).
//! - **[`HostConfig`]**: host settings read from a JSON, TOML or YAML file
//!   (plugin directories, dependency policy, default parameters).
//! - **[`ConfigFormat`]**: file format detection by extension.
pub mod error;
pub mod host;
pub mod parameters;

pub use error::ConfigError;
pub use host::{ConfigFormat, HostConfig};
pub use parameters::Parameters;

// Test module declaration
#[cfg(test)]
mod tests;
