//! Dependency provisioning.
//!
//! Installs the OS package set, removes the known-conflicting 32-bit
//! package, ensures the pinned runtime is present, and rebuilds the
//! isolated runtime environment from scratch with the pinned libraries.
//! Any failing command aborts the run.

mod version;

use crate::runner::{CommandOutput, ProcessRunner, StructuredCommand};
use crate::{DeployError, ProductProfile};
use semver::Version;
use std::path::Path;
use tracing::{info, warn};
use version::parse_version;

/// Run the dependency stage.
pub async fn run(
    runner: &dyn ProcessRunner,
    profile: &ProductProfile,
    env_dir: &Path,
) -> Result<(), DeployError> {
    install_packages(runner, profile).await?;
    remove_conflicting_package(runner, profile).await?;
    ensure_runtime(runner, profile).await?;
    recreate_environment(runner, profile, env_dir).await?;
    install_libraries(runner, profile, env_dir).await
}

async fn install_packages(
    runner: &dyn ProcessRunner,
    profile: &ProductProfile,
) -> Result<(), DeployError> {
    if profile.os_packages.is_empty() {
        return Ok(());
    }
    let cmd = StructuredCommand::new(&profile.package_manager)
        .args(["install", "-y"])
        .args(profile.os_packages.iter().cloned());
    run_checked(runner, &cmd, "install OS packages").await?;
    info!(count = profile.os_packages.len(), "OS packages present");
    Ok(())
}

async fn remove_conflicting_package(
    runner: &dyn ProcessRunner,
    profile: &ProductProfile,
) -> Result<(), DeployError> {
    let Some(package) = &profile.conflicting_package else {
        return Ok(());
    };

    let query = StructuredCommand::new("rpm").args(["-q", package.as_str()]);
    let installed = runner
        .run(&query)
        .await
        .map_err(|e| failure(&format!("query {package}"), e.to_string(), None, None))?
        .success();
    if !installed {
        return Ok(());
    }

    warn!(package = %package, "removing conflicting package");
    let remove = StructuredCommand::new(&profile.package_manager).args(["remove", "-y", package.as_str()]);
    run_checked(runner, &remove, &format!("remove {package}")).await?;
    Ok(())
}

/// Version of the runtime currently on the host, if it runs at all.
async fn installed_runtime_version(
    runner: &dyn ProcessRunner,
    executable: &str,
) -> Option<Version> {
    let cmd = StructuredCommand::new(executable).arg("--version");
    let output = runner.run(&cmd).await.ok()?;
    if !output.success() {
        return None;
    }
    parse_version(output.combined_text())
}

async fn ensure_runtime(
    runner: &dyn ProcessRunner,
    profile: &ProductProfile,
) -> Result<(), DeployError> {
    let runtime = &profile.runtime;
    let required = runtime
        .version_req()
        .map_err(|e| failure("resolve runtime version", e.to_string(), None, None))?;

    match installed_runtime_version(runner, &runtime.executable).await {
        Some(found) if required.matches(&found) => {
            info!(runtime = %runtime.executable, version = %found, "runtime present");
            return Ok(());
        }
        Some(found) => {
            warn!(runtime = %runtime.executable, version = %found, required = %required, "runtime version mismatch");
        }
        None => info!(runtime = %runtime.executable, "runtime not installed"),
    }

    let cmd = StructuredCommand::new(&profile.package_manager).args(["install", "-y", runtime.package.as_str()]);
    run_checked(runner, &cmd, &format!("install {}", runtime.package)).await?;
    Ok(())
}

/// Destroy any previous environment and build a new one.
async fn recreate_environment(
    runner: &dyn ProcessRunner,
    profile: &ProductProfile,
    env_dir: &Path,
) -> Result<(), DeployError> {
    if env_dir.exists() {
        info!(path = %env_dir.display(), "removing previous runtime environment");
        std::fs::remove_dir_all(env_dir).map_err(|e| DeployError::io(env_dir, e))?;
    }
    if let Some(parent) = env_dir.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))?;
    }

    let cmd = StructuredCommand::new(&profile.runtime.executable)
        .args(["-m", "venv"])
        .arg(env_dir.to_string_lossy());
    run_checked(runner, &cmd, "create runtime environment").await?;
    Ok(())
}

async fn install_libraries(
    runner: &dyn ProcessRunner,
    profile: &ProductProfile,
    env_dir: &Path,
) -> Result<(), DeployError> {
    if profile.libraries.is_empty() {
        return Ok(());
    }
    let python = env_dir.join("bin").join("python");
    let cmd = StructuredCommand::new(python.to_string_lossy())
        .args(["-m", "pip", "install", "--disable-pip-version-check"])
        .args(profile.libraries.iter().cloned());
    run_checked(runner, &cmd, "install runtime libraries").await?;
    info!(count = profile.libraries.len(), "runtime libraries installed");
    Ok(())
}

/// Run `cmd`, turning a spawn failure or non-zero exit into a fatal error.
async fn run_checked(
    runner: &dyn ProcessRunner,
    cmd: &StructuredCommand,
    what: &str,
) -> Result<CommandOutput, DeployError> {
    let output = runner
        .run(cmd)
        .await
        .map_err(|e| failure(what, e.to_string(), None, None))?;
    if !output.success() {
        return Err(failure(
            what,
            format!("`{cmd}` exited with {:?}", output.exit_code),
            output.exit_code,
            Some(output.stderr.clone()),
        ));
    }
    Ok(output)
}

fn failure(
    what: &str,
    detail: String,
    exit_code: Option<i32>,
    stderr: Option<String>,
) -> DeployError {
    DeployError::DependencyInstallFailure {
        message: format!("{what}: {detail}"),
        exit_code,
        stderr,
        fix: "Check the package repositories and network access, then re-run".to_string(),
    }
}
