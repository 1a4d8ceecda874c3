mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use keel_core::config::{HostConfig, Parameters};
use keel_core::kernel::constants::{APP_NAME, APP_VERSION, DEFAULT_PLUGINS_DIR};
use keel_core::plugin_system::{
    DependencyPolicy, Discovery, PluginLoader, PluginRegistry, PluginSource, StaticPluginSource,
};

// --- Plugins compiled into the host ---
use greet_on_start::GreetOnStartPlugin;
use greeter::GreeterPlugin;

use cli::{CliArgs, Command};

fn init_logging(filter: Option<&str>) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records into tracing: {}", e);
    }

    let filter = filter
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

fn builtin_plugins() -> StaticPluginSource {
    StaticPluginSource::new()
        .with(GreeterPlugin::boxed)
        .with(GreetOnStartPlugin::boxed)
}

/// `<exe dir>/plugins`, the search path when nothing else is configured.
fn default_plugin_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(DEFAULT_PLUGINS_DIR))
}

/// Config file first, then command-line overrides.
fn host_config(args: &CliArgs) -> keel_core::Result<HostConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = HostConfig::load(path)?;
            if let Some(base) = path.parent() {
                config.resolve_plugin_dirs(base);
            }
            config
        }
        None => HostConfig::default(),
    };

    config.plugin_dirs.extend(args.plugin_dirs.iter().cloned());
    if config.plugin_dirs.is_empty() {
        config.plugin_dirs.extend(default_plugin_dir());
    }
    if args.strict_dependencies {
        config.dependency_policy = DependencyPolicy::Strict;
    }
    Ok(config)
}

async fn discover(config: &HostConfig, with_builtins: bool) -> keel_core::Result<Discovery> {
    let mut sources: Vec<Box<dyn PluginSource>> = Vec::new();
    if with_builtins {
        sources.push(Box::new(builtin_plugins()));
    }
    let mut loader = PluginLoader::new()?;
    for dir in &config.plugin_dirs {
        loader.add_plugin_dir(dir);
    }
    sources.push(Box::new(loader));

    let mut discovery = Discovery::new();
    for source in &sources {
        info!("Discovering plugins from {}", source.describe());
        discovery.merge(source.discover().await);
    }
    if !discovery.failures.is_empty() {
        warn!("{} plugin candidate(s) could not be loaded", discovery.failures.len());
    }
    Ok(discovery)
}

fn print_list(registry: &PluginRegistry) {
    if registry.plugin_count() == 0 {
        println!("No plugins registered.");
        return;
    }
    println!("Registered plugins:");
    for name in registry.plugin_names() {
        let requires: Vec<String> = registry
            .requires_of(&name)
            .map(|requires| requires.iter().cloned().collect())
            .unwrap_or_default();
        let state = registry
            .state(&name)
            .map(|state| state.to_string())
            .unwrap_or_default();
        if requires.is_empty() {
            println!("  - {} ({})", name, state);
        } else {
            println!("  - {} ({}), requires: {}", name, state, requires.join(", "));
        }
    }
}

fn print_plan(registry: &PluginRegistry) {
    let plan = registry.resolution_order();
    println!("Resolution order:");
    for (position, name) in plan.order.iter().enumerate() {
        println!("  {}. {}", position + 1, name);
    }
    for missing in &plan.missing {
        println!("Missing dependency: {}", missing);
    }
    for cycle in &plan.cycles {
        println!("Cycle: {}", cycle.join(" -> "));
    }
}

fn run_plugins(registry: &mut PluginRegistry, parameters: &Parameters) {
    let report = registry.initialize_all(parameters);
    println!(
        "Initialized {} of {} plugins",
        registry.initialized_count(),
        registry.plugin_count()
    );
    for failure in &report.failures {
        println!("  failed: {}: {}", failure.plugin, failure.error);
    }
    for missing in &report.missing {
        println!("  missing dependency: {}", missing);
    }

    let services = registry.pool().all();
    println!("Object pool: {} service(s)", services.len());
    for service in &services {
        println!("  - {} [{}]", service.name(), service.capabilities().join(", "));
    }

    let shutdown = registry.shutdown_all();
    for failure in &shutdown.failures {
        println!("  shutdown failed: {}: {}", failure.plugin, failure.error);
    }
    println!("Shut down {} plugin(s)", shutdown.shut_down.len());
}

async fn run(args: CliArgs) -> keel_core::Result<()> {
    info!("{} {} starting", APP_NAME, APP_VERSION);
    let config = host_config(&args)?;

    let mut registry = PluginRegistry::with_policy(config.dependency_policy);
    let discovery = discover(&config, !args.no_builtins).await?;
    let rejected = registry.register_discovery(discovery);
    if !rejected.is_empty() {
        warn!("{} plugin(s) rejected at registration", rejected.len());
    }

    match args.command.unwrap_or(Command::Run { params: Vec::new() }) {
        Command::List => print_list(&registry),
        Command::Plan => print_plan(&registry),
        Command::Run { params } => {
            let mut parameters = config.parameters.clone();
            parameters.merge(&Parameters::from_args(&params));
            run_plugins(&mut registry, &parameters);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.log_level.as_deref());

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
