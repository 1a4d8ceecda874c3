use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::OnceLock;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `keel` with an empty plugin directory, so only built-in plugins are seen
fn keel(plugin_dir: &TempDir) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("keel")?;
    cmd.env_remove("RUST_LOG")
        .arg("--log-level")
        .arg("info")
        .arg("--plugin-dir")
        .arg(plugin_dir.path());
    Ok(cmd)
}

/// Build the example plugins with their `dynamic` feature, once per test run.
///
/// A separate target directory keeps the nested build off the lock held by
/// the outer `cargo test`.
fn dynamic_plugin_build() -> Result<&'static Path, Box<dyn std::error::Error>> {
    static BUILT: OnceLock<Result<PathBuf, String>> = OnceLock::new();
    let built = BUILT.get_or_init(|| {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let target_dir = root.join("target").join("dynamic-plugins");
        let status = process::Command::new(option_env!("CARGO").unwrap_or("cargo"))
            .arg("build")
            .arg("--manifest-path")
            .arg(root.join("Cargo.toml"))
            .arg("--target-dir")
            .arg(&target_dir)
            .args(["-p", "greeter", "-p", "greet-on-start"])
            .args(["--features", "greeter/dynamic,greet-on-start/dynamic"])
            .status()
            .map_err(|e| format!("failed to run cargo: {}", e))?;
        if !status.success() {
            return Err(format!("building dynamic plugins failed: {}", status));
        }
        Ok(target_dir.join("debug"))
    });
    built.as_deref().map_err(|e| e.as_str().into())
}

/// Copy the dynamic example plugins into `dir`
fn install_dynamic_plugins(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let built = dynamic_plugin_build()?;
    for crate_name in ["greeter", "greet_on_start"] {
        let file = format!("{}{}{}", DLL_PREFIX, crate_name, DLL_SUFFIX);
        fs::copy(built.join(&file), dir.join(&file))?;
    }
    Ok(())
}

#[test]
fn test_plan_orders_dependency_first() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    keel(&dir)?
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. greeter"))
        .stdout(predicate::str::contains("2. greet-on-start"))
        .stdout(predicate::str::contains("Cycle").not());
    Ok(())
}

#[test]
fn test_run_is_default_command() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    keel(&dir)?
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized 2 of 2 plugins"))
        .stdout(predicate::str::contains("Object pool: 1 service(s)"))
        .stdout(predicate::str::contains("Shut down 2 plugin(s)"))
        .stderr(predicate::str::contains("Hello, World!"));
    Ok(())
}

#[test]
fn test_run_passes_parameters() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    keel(&dir)?
        .args(["run", "--", "-name", "Ada", "-salutation", "Ahoy"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Ahoy, Ada!"));
    Ok(())
}

#[test]
fn test_list_shows_dependencies() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    keel(&dir)?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("greet-on-start (uninitialized), requires: greeter"))
        .stdout(predicate::str::contains("greeter (uninitialized)"));
    Ok(())
}

#[test]
fn test_no_builtins_with_empty_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    keel(&dir)?
        .arg("--no-builtins")
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized 0 of 0 plugins"))
        .stdout(predicate::str::contains("Object pool: 0 service(s)"));
    Ok(())
}

#[test]
fn test_unloadable_library_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let bogus = dir
        .path()
        .join(format!("bogus.{}", std::env::consts::DLL_EXTENSION));
    fs::write(&bogus, b"not a library")?;

    keel(&dir)?
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized 2 of 2 plugins"))
        .stderr(predicate::str::contains("bogus"));
    Ok(())
}

#[test]
fn test_config_file_parameters() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("keel.json");
    fs::write(
        &config,
        r#"{ "dependency_policy": "strict", "parameters": { "name": "Config" } }"#,
    )?;

    keel(&dir)?
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized 2 of 2 plugins"))
        .stderr(predicate::str::contains("Hello, Config!"));

    // Command-line parameters override the file
    keel(&dir)?
        .arg("--config")
        .arg(&config)
        .args(["run", "--", "-name", "Flag"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Hello, Flag!"));
    Ok(())
}

#[test]
fn test_missing_config_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    keel(&dir)?
        .arg("--config")
        .arg(dir.path().join("absent.json"))
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
    Ok(())
}

#[test]
fn test_dynamic_plugins_are_loaded_and_run() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    install_dynamic_plugins(dir.path())?;

    keel(&dir)?
        .arg("--no-builtins")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("greet-on-start (uninitialized), requires: greeter"))
        .stdout(predicate::str::contains("greeter (uninitialized)"));

    // Log records from inside the libraries reach the host subscriber
    keel(&dir)?
        .arg("--no-builtins")
        .args(["run", "--", "-name", "Dynamo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized 2 of 2 plugins"))
        .stdout(predicate::str::contains("Object pool: 1 service(s)"))
        .stdout(predicate::str::contains("Shut down 2 plugin(s)"))
        .stderr(predicate::str::contains("Hello, Dynamo!"));
    Ok(())
}

#[test]
fn test_dynamic_plugin_with_same_name_as_builtin_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    install_dynamic_plugins(dir.path())?;

    keel(&dir)?
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized 2 of 2 plugins"))
        .stderr(predicate::str::contains("2 plugin(s) rejected at registration"));
    Ok(())
}
