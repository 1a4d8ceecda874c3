use std::collections::BTreeSet;

use greeting_api::Greeter;
use keel_core::plugin_system::{Plugin, PluginContext, PluginError};

pub const PLUGIN_NAME: &str = "greet-on-start";

/// Startup parameter naming who gets greeted
pub const NAME_PARAM: &str = "name";

/// Greets once through every published [`Greeter`] when initialized.
#[derive(Default)]
pub struct GreetOnStartPlugin {
    greetings: Vec<String>,
}

impl GreetOnStartPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed() -> Box<dyn Plugin> {
        Box::new(Self::new())
    }

    /// Greetings produced by the last successful initialization
    pub fn greetings(&self) -> &[String] {
        &self.greetings
    }
}

impl Plugin for GreetOnStartPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn requires(&self) -> BTreeSet<String> {
        BTreeSet::from(["greeter".to_string()])
    }

    fn initialize(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError> {
        let name = context.parameters().get_or(NAME_PARAM, "World".to_string());
        let greeters = context.pool().all_of_type::<dyn Greeter>();
        if greeters.is_empty() {
            return Err(PluginError::MissingService(
                std::any::type_name::<dyn Greeter>().to_string(),
            ));
        }

        self.greetings = greeters.iter().map(|greeter| greeter.greet(&name)).collect();
        for greeting in &self.greetings {
            log::info!("{}", greeting);
        }
        Ok(())
    }
}

#[cfg(feature = "dynamic")]
keel_core::export_plugin!(GreetOnStartPlugin::new());

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use greeting_api::SalutationGreeter;
    use keel_core::object_pool::{ServiceHandle, SharedObjectPool};
    use keel_core::Parameters;

    #[test]
    fn test_greets_through_every_greeter() {
        let pool = SharedObjectPool::new();
        for salutation in ["Hi", "Yo"] {
            pool.add(
                ServiceHandle::builder(salutation)
                    .provide::<dyn Greeter>(Arc::new(SalutationGreeter::new(salutation)))
                    .build(),
            );
        }
        let params = Parameters::from_args(["-name", "Ada"]);
        let mut plugin = GreetOnStartPlugin::new();

        plugin
            .initialize(&PluginContext::new(PLUGIN_NAME, &params, &pool))
            .unwrap();

        assert_eq!(plugin.greetings(), &["Hi, Ada!", "Yo, Ada!"]);
    }

    #[test]
    fn test_fails_without_greeter() {
        let pool = SharedObjectPool::new();
        let params = Parameters::new();
        let mut plugin = GreetOnStartPlugin::new();

        let err = plugin
            .initialize(&PluginContext::new(PLUGIN_NAME, &params, &pool))
            .unwrap_err();

        assert!(matches!(err, PluginError::MissingService(_)));
        assert!(plugin.greetings().is_empty());
    }
}
