use std::collections::BTreeSet;

use thiserror::Error;

use crate::config::{ConfigError, Parameters};
use crate::object_pool::{ServiceHandle, SharedObjectPool};

/// Error type returned by plugin implementations
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin initialization error: {0}")]
    InitError(String),
    #[error("Plugin shutdown error: {0}")]
    ShutdownError(String),
    #[error("Required service not found in object pool: {0}")]
    MissingService(String),
    #[error("Plugin configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Plugin panicked: {0}")]
    Panicked(String),
}

/// What a plugin sees while it initializes.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    plugin_name: &'a str,
    parameters: &'a Parameters,
    pool: &'a SharedObjectPool,
}

impl<'a> PluginContext<'a> {
    pub fn new(plugin_name: &'a str, parameters: &'a Parameters, pool: &'a SharedObjectPool) -> Self {
        Self {
            plugin_name,
            parameters,
            pool,
        }
    }

    /// Name of the plugin being initialized
    pub fn plugin_name(&self) -> &'a str {
        self.plugin_name
    }

    /// Startup parameters, identical for every plugin
    pub fn parameters(&self) -> &'a Parameters {
        self.parameters
    }

    /// The registry's object pool. Clone it to keep access after initialization.
    pub fn pool(&self) -> &'a SharedObjectPool {
        self.pool
    }

    /// Shorthand for `pool().add(handle)`
    pub fn publish(&self, handle: ServiceHandle) {
        self.pool.add(handle);
    }
}

/// Core trait that all plugins must implement
pub trait Plugin: Send + Sync {
    /// Unique name, used as registry key and as the token other plugins list in `requires`
    fn name(&self) -> &str;

    /// Names of plugins that must be attempted before this one.
    fn requires(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Set up the plugin and publish its services into the object pool.
    ///
    /// The registry calls this at most once per successful initialization;
    /// after an error it may be called again by a later pass.
    fn initialize(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError>;

    /// Release resources. Advisory: only called through
    /// [`PluginRegistry::shutdown_all`](crate::plugin_system::PluginRegistry::shutdown_all).
    fn shutdown(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}
