//! # Keel Kernel
//!
//! Process-wide constants and the aggregate error type shared by every
//! subsystem of `keel-core`.
//!
//! - **Constants**: application name, plugin API version, the interface
//!   identifier dynamic plugins must declare and default search paths
//!   ([`constants`]).
//! - **Error Handling**: the top-level [`Error`](error::Error) enum that wraps
//!   the typed errors of the plugin system and configuration layer, plus the
//!   [`Result`](error::Result) alias.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
