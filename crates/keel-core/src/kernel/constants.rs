/// Application name
pub const APP_NAME: &str = "Keel";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the plugin API exposed to dynamic plugins.
/// A plugin built against a semver-compatible version may be loaded.
pub const API_VERSION: &str = "0.1.0";

/// Interface identifier every dynamic plugin declaration must carry.
pub const PLUGIN_INTERFACE_ID: &str = "org.keel.plugins.Plugin/1";

/// Name of the static exported by `export_plugin!`, NUL-terminated for symbol lookup.
pub const PLUGIN_DECLARATION_SYMBOL: &[u8] = b"KEEL_PLUGIN_DECLARATION\0";

/// Default plugins directory, relative to the executable's directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";
