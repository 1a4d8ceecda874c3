use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keel: plugin host with dependency-ordered initialization
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Host configuration file (.json, .toml, .yaml or .yml)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Additional directory to scan for plugin libraries (repeatable)
    #[arg(long = "plugin-dir", value_name = "DIR", global = true)]
    pub plugin_dirs: Vec<PathBuf>,

    /// Skip plugins whose dependencies did not initialize
    #[arg(long, global = true)]
    pub strict_dependencies: bool,

    /// Do not register the plugins compiled into this binary
    #[arg(long, global = true)]
    pub no_builtins: bool,

    /// Log filter, e.g. `debug` or `keel_core=trace` (defaults to RUST_LOG, then `info`)
    #[arg(long, value_name = "FILTER", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize every plugin, report, then shut down (default)
    Run {
        /// Startup parameters for every plugin, after `--`: `keel run -- -name Ada --verbose`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        params: Vec<String>,
    },
    /// Print the initialization order without initializing anything
    Plan,
    /// List discovered plugins and their dependencies
    List,
}
