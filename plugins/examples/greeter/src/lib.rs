use std::sync::Arc;

use greeting_api::{Greeter, SalutationGreeter};
use keel_core::object_pool::{ServiceHandle, SharedObjectPool};
use keel_core::plugin_system::{Plugin, PluginContext, PluginError};

pub const PLUGIN_NAME: &str = "greeter";

/// Startup parameter selecting the salutation
pub const SALUTATION_PARAM: &str = "salutation";

/// Publishes a [`Greeter`] into the object pool and withdraws it on shutdown.
#[derive(Default)]
pub struct GreeterPlugin {
    published: Option<(SharedObjectPool, ServiceHandle)>,
}

impl GreeterPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructor in the shape static plugin sources expect
    pub fn boxed() -> Box<dyn Plugin> {
        Box::new(Self::new())
    }
}

impl Plugin for GreeterPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn initialize(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError> {
        let salutation = context
            .parameters()
            .get_or(SALUTATION_PARAM, "Hello".to_string());
        let service = Arc::new(SalutationGreeter::new(salutation));
        let handle = ServiceHandle::builder(PLUGIN_NAME)
            .provide::<dyn Greeter>(service.clone())
            .provide::<SalutationGreeter>(service)
            .build();

        context.publish(handle.clone());
        log::info!("Greeter service published");
        self.published = Some((context.pool().clone(), handle));
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), PluginError> {
        if let Some((pool, handle)) = self.published.take() {
            pool.remove(&handle);
            log::info!("Greeter service withdrawn");
        }
        Ok(())
    }
}

#[cfg(feature = "dynamic")]
keel_core::export_plugin!(GreeterPlugin::new());

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{Parameters, PluginRegistry};

    #[test]
    fn test_publishes_and_withdraws_greeter() {
        let mut registry = PluginRegistry::new();
        registry.register(GreeterPlugin::boxed()).unwrap();
        let params = Parameters::from_args(["-salutation", "Howdy"]);

        registry.ensure_initialized(PLUGIN_NAME, &params).unwrap();

        let greeters = registry.pool().all_of_type::<dyn Greeter>();
        assert_eq!(greeters.len(), 1);
        assert_eq!(greeters[0].greet("partner"), "Howdy, partner!");

        let report = registry.shutdown_all();
        assert!(report.failures.is_empty());
        assert!(registry.pool().is_empty());
    }
}
