pub mod config;
pub mod kernel;
pub mod object_pool;
pub mod plugin_system;

// Re-export key public types/traits for easier use by the binary and plugins
pub use config::{HostConfig, Parameters};
pub use kernel::error::{Error, Result};
pub use object_pool::{ObjectPool, PoolEvent, PoolEventKind, ServiceHandle, SharedObjectPool};
pub use plugin_system::{
    DependencyPolicy, InitializationReport, Plugin, PluginContext, PluginError, PluginRegistry,
    PluginState,
};
