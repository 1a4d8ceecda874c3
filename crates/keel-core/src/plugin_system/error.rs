//! # Keel Plugin System Errors
//!
//! [`PluginSystemError`] covers loading, registration, dependency resolution,
//! initialization and shutdown failures. None of them abort a startup pass;
//! they are collected into reports and logged.
use std::path::PathBuf;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::traits::PluginError;
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin loading failed for '{plugin_id}': {source}")]
    LoadingError {
        plugin_id: String,
        path: Option<PathBuf>,
        #[source]
        source: Box<PluginSystemErrorSource>,
    },

    #[error("Library '{path}' does not implement the plugin interface (expected '{expected}', found '{found}')")]
    InterfaceMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Library '{path}' was built for plugin API {plugin_api}, host provides {host_api}")]
    IncompatibleApiVersion {
        path: PathBuf,
        plugin_api: String,
        host_api: String,
    },

    #[error("Plugin registration error for '{plugin_id}': {message}")]
    RegistrationError {
        plugin_id: String,
        message: String,
    },

    #[error("Plugin not found: {plugin_id}")]
    NotFound {
        plugin_id: String,
    },

    #[error("Plugin initialization error for '{plugin_id}': {source}")]
    InitializationError {
        plugin_id: String,
        #[source]
        source: PluginError,
    },

    #[error("Plugin '{plugin_id}' skipped, dependencies unavailable: {}", .dependencies.join(", "))]
    DependencyFailed {
        plugin_id: String,
        dependencies: Vec<String>,
    },

    #[error("Plugin shutdown error for '{plugin_id}': {source}")]
    ShutdownError {
        plugin_id: String,
        #[source]
        source: PluginError,
    },

    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),

    #[error("Version parsing error: {0}")]
    VersionParsing(#[from] VersionError),

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemErrorSource {
    #[error(transparent)]
    Library(#[from] libloading::Error),
    #[error("panic: {0}")]
    Panic(String),
    #[error("Other: {0}")]
    Other(String),
}
