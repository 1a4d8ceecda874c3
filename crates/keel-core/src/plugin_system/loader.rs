use std::collections::BTreeSet;
use std::fmt;
use std::panic;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use libloading::{Library, Symbol};
use tokio::fs;

use crate::kernel::constants::{PLUGIN_DECLARATION_SYMBOL, PLUGIN_INTERFACE_ID};
use crate::kernel::error::panic_message;
use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource};
use crate::plugin_system::traits::{Plugin, PluginContext, PluginError};
use crate::plugin_system::version::ApiVersion;

/// What a plugin library exports, see [`export_plugin!`](crate::export_plugin).
///
/// Host and plugin must be built with the same compiler and the same
/// `keel-core` major API: the declaration and the returned trait object use
/// the Rust ABI.
///
/// A library carries its own copy of the `log` facade. The loader hands it the
/// host logger through `install_logger` before `create` runs, so plugin log
/// records reach the host's subscriber.
#[derive(Clone, Copy)]
pub struct PluginDeclaration {
    /// Must equal [`PLUGIN_INTERFACE_ID`]
    pub interface_id: &'static str,
    /// `API_VERSION` of the `keel-core` the plugin was built against
    pub api_version: &'static str,
    pub install_logger: fn(&'static dyn log::Log, log::LevelFilter),
    pub create: fn() -> Box<dyn Plugin>,
}

/// Route this image's `log` facade to `logger`.
///
/// Does nothing when a logger is already installed, which is the case when the
/// plugin shares the host's facade.
pub fn adopt_host_logger(logger: &'static dyn log::Log, level: log::LevelFilter) {
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}

impl fmt::Debug for PluginDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDeclaration")
            .field("interface_id", &self.interface_id)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

/// Export a plugin from a `cdylib`.
///
/// ```ignore
/// keel_core::export_plugin!(MyPlugin::default());
/// ```
///
/// Use it once per library; the expression is evaluated each time the host
/// asks for an instance.
#[macro_export]
macro_rules! export_plugin {
    ($constructor:expr) => {
        #[doc(hidden)]
        fn __keel_create_plugin() -> ::std::boxed::Box<dyn $crate::plugin_system::Plugin> {
            ::std::boxed::Box::new($constructor)
        }

        #[doc(hidden)]
        #[unsafe(no_mangle)]
        pub static KEEL_PLUGIN_DECLARATION: $crate::plugin_system::loader::PluginDeclaration =
            $crate::plugin_system::loader::PluginDeclaration {
                interface_id: $crate::kernel::constants::PLUGIN_INTERFACE_ID,
                api_version: $crate::kernel::constants::API_VERSION,
                install_logger: $crate::plugin_system::loader::adopt_host_logger,
                create: __keel_create_plugin,
            };
    };
}

/// A plugin instance created from a dynamic library.
///
/// Field order matters: the instance is dropped before its library is unmapped.
pub struct LibraryPlugin {
    plugin: Box<dyn Plugin>,
    _library: Library,
    path: PathBuf,
}

impl LibraryPlugin {
    /// The file the plugin was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Plugin for LibraryPlugin {
    fn name(&self) -> &str {
        self.plugin.name()
    }

    fn requires(&self) -> BTreeSet<String> {
        self.plugin.requires()
    }

    fn initialize(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError> {
        self.plugin.initialize(context)
    }

    fn shutdown(&mut self) -> Result<(), PluginError> {
        self.plugin.shutdown()
    }
}

impl fmt::Debug for LibraryPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryPlugin")
            .field("name", &self.plugin.name())
            .field("path", &self.path)
            .finish()
    }
}

/// A candidate that did not produce a plugin.
#[derive(Debug)]
pub struct LoadFailure {
    /// Library path, or a label for non-file sources
    pub origin: String,
    pub error: PluginSystemError,
}

/// Plugins produced by a source, plus whatever could not be loaded.
#[derive(Default)]
pub struct Discovery {
    pub plugins: Vec<Box<dyn Plugin>>,
    pub failures: Vec<LoadFailure>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append everything `other` found
    pub fn merge(&mut self, other: Discovery) {
        self.plugins.extend(other.plugins);
        self.failures.extend(other.failures);
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty() && self.failures.is_empty()
    }
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovery")
            .field("plugins", &self.plugin_names())
            .field("failures", &self.failures)
            .finish()
    }
}

/// Anything that can hand the registry a list of plugin instances.
#[async_trait]
pub trait PluginSource: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    async fn discover(&self) -> Discovery;
}

/// Plugins compiled into the host.
#[derive(Default)]
pub struct StaticPluginSource {
    constructors: Vec<fn() -> Box<dyn Plugin>>,
}

impl StaticPluginSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, constructor: fn() -> Box<dyn Plugin>) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn push(&mut self, constructor: fn() -> Box<dyn Plugin>) {
        self.constructors.push(constructor);
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

#[async_trait]
impl PluginSource for StaticPluginSource {
    fn describe(&self) -> String {
        format!("{} built-in plugin(s)", self.constructors.len())
    }

    async fn discover(&self) -> Discovery {
        let mut discovery = Discovery::new();
        for (index, constructor) in self.constructors.iter().enumerate() {
            match panic::catch_unwind(*constructor) {
                Ok(plugin) => discovery.plugins.push(plugin),
                Err(payload) => {
                    let origin = format!("built-in #{}", index);
                    let error = PluginSystemError::LoadingError {
                        plugin_id: origin.clone(),
                        path: None,
                        source: Box::new(PluginSystemErrorSource::Panic(panic_message(payload.as_ref()))),
                    };
                    log::warn!("{}", error);
                    discovery.failures.push(LoadFailure { origin, error });
                }
            }
        }
        discovery
    }
}

impl fmt::Debug for StaticPluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPluginSource")
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

/// Loads plugins from dynamic libraries found in a list of directories.
#[derive(Debug, Clone)]
pub struct PluginLoader {
    plugin_dirs: Vec<PathBuf>,
    api_version: ApiVersion,
}

impl PluginLoader {
    /// Loader accepting plugins compatible with this build's API version
    pub fn new() -> Result<Self, PluginSystemError> {
        Ok(Self::with_api_version(ApiVersion::host()?))
    }

    pub fn with_api_version(api_version: ApiVersion) -> Self {
        Self {
            plugin_dirs: Vec::new(),
            api_version,
        }
    }

    pub fn add_plugin_dir(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.plugin_dirs.contains(&dir) {
            self.plugin_dirs.push(dir);
        }
    }

    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    pub fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Whether `path` has this platform's shared library extension
    pub fn is_library_path(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(std::env::consts::DLL_EXTENSION))
    }

    /// Library files in the configured directories (non-recursive), sorted per
    /// directory. Missing or unreadable directories are skipped.
    pub async fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        for dir in &self.plugin_dirs {
            match fs::metadata(dir).await {
                Ok(metadata) if metadata.is_dir() => {}
                Ok(_) => {
                    log::warn!("Plugin path {} is not a directory, skipping", dir.display());
                    continue;
                }
                Err(_) => {
                    log::debug!("Plugin directory {} does not exist, skipping", dir.display());
                    continue;
                }
            }

            let mut entries = match fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Failed to read plugin directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            let mut found = Vec::new();
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        let path = entry.path();
                        let is_file = entry
                            .file_type()
                            .await
                            .map(|file_type| file_type.is_file() || file_type.is_symlink())
                            .unwrap_or(false);
                        if is_file && Self::is_library_path(&path) {
                            found.push(path);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("Error while reading {}: {}", dir.display(), e);
                        break;
                    }
                }
            }
            found.sort();
            candidates.extend(found);
        }
        candidates
    }

    /// Load every candidate library; failures are logged and returned.
    pub async fn load_all(&self) -> Discovery {
        let mut discovery = Discovery::new();
        for path in self.candidates().await {
            log::info!("Loading plugin library {}", path.display());
            match self.load_library(&path).await {
                Ok(plugin) => {
                    log::info!("Loaded plugin '{}' from {}", plugin.name(), path.display());
                    discovery.plugins.push(plugin);
                }
                Err(error) => {
                    log::warn!("{}", error);
                    discovery.failures.push(LoadFailure {
                        origin: path.display().to_string(),
                        error,
                    });
                }
            }
        }
        discovery
    }

    /// Open one library on the blocking pool and instantiate its plugin.
    pub async fn load_library(&self, path: &Path) -> Result<Box<dyn Plugin>, PluginSystemError> {
        let owned_path = path.to_path_buf();
        let host_api = self.api_version.clone();
        let joined = tokio::task::spawn_blocking(move || open_library(owned_path, &host_api)).await;
        match joined {
            Ok(result) => result.map(|plugin| Box::new(plugin) as Box<dyn Plugin>),
            Err(join_error) => Err(PluginSystemError::LoadingError {
                plugin_id: plugin_id_for(path),
                path: Some(path.to_path_buf()),
                source: Box::new(PluginSystemErrorSource::Other(format!(
                    "loader task failed: {}",
                    join_error
                ))),
            }),
        }
    }
}

#[async_trait]
impl PluginSource for PluginLoader {
    fn describe(&self) -> String {
        let dirs: Vec<String> = self
            .plugin_dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        format!("plugin directories [{}]", dirs.join(", "))
    }

    async fn discover(&self) -> Discovery {
        self.load_all().await
    }
}

fn plugin_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn loading_error(path: &Path, source: PluginSystemErrorSource) -> PluginSystemError {
    PluginSystemError::LoadingError {
        plugin_id: plugin_id_for(path),
        path: Some(path.to_path_buf()),
        source: Box::new(source),
    }
}

/// Reject declarations from another plugin interface or an incompatible API.
pub(crate) fn check_declaration(
    path: &Path,
    declaration: &PluginDeclaration,
    host_api: &ApiVersion,
) -> Result<(), PluginSystemError> {
    if declaration.interface_id != PLUGIN_INTERFACE_ID {
        return Err(PluginSystemError::InterfaceMismatch {
            path: path.to_path_buf(),
            expected: PLUGIN_INTERFACE_ID.to_string(),
            found: declaration.interface_id.to_string(),
        });
    }
    let plugin_api: ApiVersion = declaration.api_version.parse()?;
    if !host_api.accepts(&plugin_api) {
        return Err(PluginSystemError::IncompatibleApiVersion {
            path: path.to_path_buf(),
            plugin_api: declaration.api_version.to_string(),
            host_api: host_api.to_string(),
        });
    }
    Ok(())
}

fn open_library(path: PathBuf, host_api: &ApiVersion) -> Result<LibraryPlugin, PluginSystemError> {
    // Running a library's initializers is inherently trusted.
    let library = unsafe { Library::new(&path) }
        .map_err(|e| loading_error(&path, PluginSystemErrorSource::Library(e)))?;

    let declaration: PluginDeclaration = unsafe {
        let symbol: Symbol<*const PluginDeclaration> = library
            .get(PLUGIN_DECLARATION_SYMBOL)
            .map_err(|e| loading_error(&path, PluginSystemErrorSource::Library(e)))?;
        **symbol
    };

    check_declaration(&path, &declaration, host_api)?;
    (declaration.install_logger)(log::logger(), log::max_level());

    let plugin = panic::catch_unwind(declaration.create).map_err(|payload| {
        loading_error(&path, PluginSystemErrorSource::Panic(panic_message(payload.as_ref())))
    })?;

    Ok(LibraryPlugin {
        plugin,
        _library: library,
        path,
    })
}
