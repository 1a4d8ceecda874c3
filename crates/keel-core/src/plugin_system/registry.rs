use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::config::Parameters;
use crate::kernel::error::panic_message;
use crate::object_pool::SharedObjectPool;
use crate::plugin_system::dependency::{
    DependencyError, DependencyGraph, DependencyPolicy, MissingDependency, ResolutionPlan,
};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::Discovery;
use crate::plugin_system::traits::{Plugin, PluginContext, PluginError};

/// Lifecycle of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Registered, never attempted (or skipped)
    Uninitialized,
    /// `initialize` is running
    Initializing,
    /// Terminal for the lifetime of the registry
    Initialized,
    /// The last attempt failed; a later pass retries it
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PluginState::Uninitialized => "uninitialized",
            PluginState::Initializing => "initializing",
            PluginState::Initialized => "initialized",
            PluginState::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// A registered plugin together with its bookkeeping.
pub struct PluginDescriptor {
    plugin: Box<dyn Plugin>,
    requires: BTreeSet<String>,
    state: PluginState,
    attempts: u32,
    shut_down: bool,
}

impl PluginDescriptor {
    fn new(plugin: Box<dyn Plugin>) -> Self {
        let requires = plugin.requires();
        Self {
            plugin,
            requires,
            state: PluginState::Uninitialized,
            attempts: 0,
            shut_down: false,
        }
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    /// Dependencies as declared at registration time
    pub fn requires(&self) -> &BTreeSet<String> {
        &self.requires
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Number of times `initialize` has been invoked
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name())
            .field("requires", &self.requires)
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// A plugin that did not make it through a pass, and why.
#[derive(Debug)]
pub struct PluginFailure {
    pub plugin: String,
    pub error: PluginSystemError,
}

/// Result of an initialization pass.
#[derive(Debug, Default)]
pub struct InitializationReport {
    /// Plugins initialized during this pass, in initialization order
    pub initialized: Vec<String>,
    /// Failed, skipped and cyclic plugins
    pub failures: Vec<PluginFailure>,
    pub missing: Vec<MissingDependency>,
    pub cycles: Vec<Vec<String>>,
}

impl InitializationReport {
    /// No failures, no missing dependencies, no cycles
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.missing.is_empty() && self.cycles.is_empty()
    }

    pub fn failure_for(&self, plugin: &str) -> Option<&PluginSystemError> {
        self.failures
            .iter()
            .find(|failure| failure.plugin == plugin)
            .map(|failure| &failure.error)
    }

    /// Plugins skipped under [`DependencyPolicy::Strict`]
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.failures
            .iter()
            .filter(|failure| matches!(failure.error, PluginSystemError::DependencyFailed { .. }))
            .map(|failure| failure.plugin.as_str())
    }

    fn take_failure(&mut self, plugin: &str) -> Option<PluginSystemError> {
        let position = self.failures.iter().position(|failure| failure.plugin == plugin)?;
        Some(self.failures.remove(position).error)
    }
}

/// Result of [`PluginRegistry::shutdown_all`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Plugins whose `shutdown` returned successfully, in call order
    pub shut_down: Vec<String>,
    pub failures: Vec<PluginFailure>,
}

/// Registry for managing plugins.
///
/// Owns every registered plugin and the object pool they publish into, and
/// runs dependency-ordered initialization. There is one registry per host;
/// it is passed explicitly to whoever needs it.
pub struct PluginRegistry {
    /// Cleared on drop before the plugins (and their libraries) go away
    pool: SharedObjectPool,
    plugins: BTreeMap<String, PluginDescriptor>,
    /// Names in the order they reached `Initialized`
    init_order: Vec<String>,
    policy: DependencyPolicy,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::with_policy(DependencyPolicy::default())
    }

    pub fn with_policy(policy: DependencyPolicy) -> Self {
        Self {
            pool: SharedObjectPool::new(),
            plugins: BTreeMap::new(),
            init_order: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DependencyPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: DependencyPolicy) {
        self.policy = policy;
    }

    /// The object pool shared with every plugin
    pub fn pool(&self) -> &SharedObjectPool {
        &self.pool
    }

    /// Register a plugin under its own name.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginSystemError> {
        let name = plugin.name().to_string();
        if name.trim().is_empty() {
            return Err(PluginSystemError::RegistrationError {
                plugin_id: name,
                message: "plugin name must not be empty".to_string(),
            });
        }
        if self.plugins.contains_key(&name) {
            return Err(PluginSystemError::RegistrationError {
                plugin_id: name,
                message: "a plugin with this name is already registered".to_string(),
            });
        }

        let descriptor = PluginDescriptor::new(plugin);
        if descriptor.requires.contains(&name) {
            log::warn!("Plugin '{}' lists itself as a dependency", name);
        }
        log::info!(
            "Registered plugin '{}' (requires: {:?})",
            name,
            descriptor.requires
        );
        self.plugins.insert(name, descriptor);
        Ok(())
    }

    /// Register several plugins; rejected ones are logged and returned.
    pub fn register_all<I>(&mut self, plugins: I) -> Vec<PluginSystemError>
    where
        I: IntoIterator<Item = Box<dyn Plugin>>,
    {
        let mut errors = Vec::new();
        for plugin in plugins {
            if let Err(e) = self.register(plugin) {
                log::warn!("{}", e);
                errors.push(e);
            }
        }
        errors
    }

    /// Register what a plugin source produced. Load failures were already
    /// reported by the source and are only counted here.
    pub fn register_discovery(&mut self, discovery: Discovery) -> Vec<PluginSystemError> {
        if !discovery.failures.is_empty() {
            log::debug!(
                "Discovery reported {} load failure(s)",
                discovery.failures.len()
            );
        }
        self.register_all(discovery.plugins)
    }

    /// Remove a plugin that has not been initialized.
    pub fn unregister(&mut self, name: &str) -> Result<Box<dyn Plugin>, PluginSystemError> {
        let state = self
            .state(name)
            .ok_or_else(|| PluginSystemError::NotFound {
                plugin_id: name.to_string(),
            })?;
        if state == PluginState::Initialized {
            return Err(PluginSystemError::RegistrationError {
                plugin_id: name.to_string(),
                message: "an initialized plugin cannot be unregistered".to_string(),
            });
        }
        let descriptor = self
            .plugins
            .remove(name)
            .ok_or_else(|| PluginSystemError::NotFound {
                plugin_id: name.to_string(),
            })?;
        log::info!("Unregistered plugin '{}'", name);
        Ok(descriptor.plugin)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(name)
    }

    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.plugins.get(name).map(PluginDescriptor::state)
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.state(name) == Some(PluginState::Initialized)
    }

    /// Registered names, sorted
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn requires_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.plugins.get(name).map(PluginDescriptor::requires)
    }

    /// Registered plugins that declare `name` as a dependency
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.plugins
            .iter()
            .filter(|(_, descriptor)| descriptor.requires.contains(name))
            .map(|(plugin_name, _)| plugin_name.clone())
            .collect()
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    pub fn initialized_count(&self) -> usize {
        self.init_order.len()
    }

    /// Plugins in the order they were initialized
    pub fn initialization_order(&self) -> &[String] {
        &self.init_order
    }

    /// What a full pass would do now, without running anything.
    pub fn resolution_order(&self) -> ResolutionPlan {
        self.plan_for(self.plugins.keys())
    }

    /// Initialize `name` after attempting everything it depends on.
    ///
    /// Returns immediately if the plugin is already initialized. Dependency
    /// failures are logged; the result only describes `name` itself.
    pub fn ensure_initialized(
        &mut self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<(), PluginSystemError> {
        let state = self
            .state(name)
            .ok_or_else(|| PluginSystemError::NotFound {
                plugin_id: name.to_string(),
            })?;
        if state == PluginState::Initialized {
            return Ok(());
        }

        let plan = self.plan_for([name]);
        let mut report = self.run_plan(plan, parameters);
        if self.is_initialized(name) {
            return Ok(());
        }
        Err(report.take_failure(name).unwrap_or_else(|| {
            PluginSystemError::InternalError(format!(
                "plugin '{}' was neither initialized nor reported as failed",
                name
            ))
        }))
    }

    /// Offer every registered plugin one initialization attempt.
    pub fn initialize_all(&mut self, parameters: &Parameters) -> InitializationReport {
        let plan = self.resolution_order();
        let report = self.run_plan(plan, parameters);
        log::info!(
            "Initialization pass finished: {} initialized, {} failed, {} total initialized of {}",
            report.initialized.len(),
            report.failures.len(),
            self.initialized_count(),
            self.plugin_count()
        );
        report
    }

    /// Call `shutdown` on every initialized plugin, newest first.
    ///
    /// Failures are collected, never abort the sweep, and leave states alone.
    /// Each plugin is shut down at most once.
    pub fn shutdown_all(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for name in self.init_order.iter().rev() {
            let Some(descriptor) = self.plugins.get_mut(name) else {
                continue;
            };
            if descriptor.shut_down {
                continue;
            }
            descriptor.shut_down = true;

            log::info!("Shutting down plugin '{}'", name);
            let plugin = &mut descriptor.plugin;
            let result = panic::catch_unwind(AssertUnwindSafe(|| plugin.shutdown()))
                .unwrap_or_else(|payload| Err(PluginError::Panicked(panic_message(payload.as_ref()))));
            match result {
                Ok(()) => report.shut_down.push(name.clone()),
                Err(source) => {
                    let error = PluginSystemError::ShutdownError {
                        plugin_id: name.clone(),
                        source,
                    };
                    log::error!("{}", error);
                    report.failures.push(PluginFailure {
                        plugin: name.clone(),
                        error,
                    });
                }
            }
        }
        report
    }

    fn plan_for<I, S>(&self, roots: I) -> ResolutionPlan
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let graph = DependencyGraph::new(
            self.plugins
                .iter()
                .map(|(name, descriptor)| (name.clone(), descriptor.requires.iter().cloned())),
        );
        graph.resolve(roots, |name| self.is_initialized(name))
    }

    fn run_plan(&mut self, plan: ResolutionPlan, parameters: &Parameters) -> InitializationReport {
        let mut report = InitializationReport::default();

        for missing in &plan.missing {
            log::warn!("Loading dependency failed: {}", missing);
        }
        for cycle in &plan.cycles {
            let error = DependencyError::CyclicDependency(cycle.clone());
            log::error!("{}", error);
            // The last element repeats the first.
            for member in &cycle[..cycle.len().saturating_sub(1)] {
                report.failures.push(PluginFailure {
                    plugin: member.clone(),
                    error: PluginSystemError::DependencyResolution(error.clone()),
                });
            }
        }

        for name in &plan.order {
            if self.is_initialized(name) {
                continue;
            }
            if self.policy == DependencyPolicy::Strict {
                let unavailable = self.unavailable_dependencies(name);
                if !unavailable.is_empty() {
                    let error = PluginSystemError::DependencyFailed {
                        plugin_id: name.clone(),
                        dependencies: unavailable,
                    };
                    log::warn!("{}", error);
                    report.failures.push(PluginFailure {
                        plugin: name.clone(),
                        error,
                    });
                    continue;
                }
            }
            match self.initialize_one(name, parameters) {
                Ok(()) => report.initialized.push(name.clone()),
                Err(error) => report.failures.push(PluginFailure {
                    plugin: name.clone(),
                    error,
                }),
            }
        }

        report.missing = plan.missing;
        report.cycles = plan.cycles;
        report
    }

    fn unavailable_dependencies(&self, name: &str) -> Vec<String> {
        self.requires_of(name)
            .map(|requires| {
                requires
                    .iter()
                    .filter(|dependency| !self.is_initialized(dependency))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn initialize_one(&mut self, name: &str, parameters: &Parameters) -> Result<(), PluginSystemError> {
        let pool = &self.pool;
        let descriptor = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| PluginSystemError::NotFound {
                plugin_id: name.to_string(),
            })?;

        log::info!("Initializing plugin '{}'", name);
        descriptor.state = PluginState::Initializing;
        descriptor.attempts += 1;

        let context = PluginContext::new(name, parameters, pool);
        let plugin = &mut descriptor.plugin;
        let result = panic::catch_unwind(AssertUnwindSafe(|| plugin.initialize(&context)))
            .unwrap_or_else(|payload| Err(PluginError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => {
                descriptor.state = PluginState::Initialized;
                self.init_order.push(name.to_string());
                log::debug!("Plugin '{}' initialized", name);
                Ok(())
            }
            Err(source) => {
                descriptor.state = PluginState::Failed;
                let error = PluginSystemError::InitializationError {
                    plugin_id: name.to_string(),
                    source,
                };
                log::warn!("{}", error);
                Err(error)
            }
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginRegistry {
    fn drop(&mut self) {
        // Handles and observers may point into plugin libraries.
        self.pool.with_pool(|pool| pool.reset());
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins)
            .field("init_order", &self.init_order)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
