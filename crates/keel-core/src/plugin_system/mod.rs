//! # Keel Plugin System
//!
//! Discovery, dependency resolution and initialization of plugins.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`traits`]**: the [`Plugin`] trait every plugin implements and the
//!   [`PluginContext`] handed to it during initialization.
//! - **[`registry`]**: [`PluginRegistry`], which owns the discovered plugins and
//!   the shared object pool and runs dependency-ordered initialization.
//! - **[`dependency`]**: the [`DependencyGraph`] resolution order computation
//!   with missing-dependency and cycle reporting.
//! - **[`loader`]**: [`PluginLoader`], which scans directories and opens plugin
//!   libraries, and the [`PluginSource`] seam it shares with statically linked
//!   plugins.
//! - **[`version`]**: plugin API version compatibility.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
pub mod dependency;
pub mod error;
pub mod loader;
pub mod registry;
pub mod traits;
pub mod version;

pub use dependency::{DependencyError, DependencyGraph, DependencyPolicy, MissingDependency, ResolutionPlan};
pub use error::PluginSystemError;
pub use loader::{Discovery, LoadFailure, PluginDeclaration, PluginLoader, PluginSource, StaticPluginSource};
pub use registry::{InitializationReport, PluginDescriptor, PluginFailure, PluginRegistry, PluginState, ShutdownReport};
pub use traits::{Plugin, PluginContext, PluginError};
pub use version::ApiVersion;

// Test module declaration
#[cfg(test)]
mod tests;
