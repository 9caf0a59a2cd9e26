//! Kernel network parameter overrides.

use crate::profile::KernelParameter;
use crate::runner::{ProcessRunner, StructuredCommand};
use crate::DeployError;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Whether `contents` already assigns `key` on a non-comment line.
fn has_key(contents: &str, key: &str) -> bool {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| line.split_once('='))
        .any(|(existing, _)| existing.trim() == key)
}

/// Append each parameter whose key is not yet present in `path`.
///
/// Existing lines are never rewritten or duplicated. Returns the lines
/// that were appended.
pub fn append_missing(path: &Path, params: &[KernelParameter]) -> Result<Vec<String>, DeployError> {
    let current = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(DeployError::io(path, e)),
    };

    let missing: Vec<String> = params
        .iter()
        .filter(|param| !has_key(&current, &param.key))
        .map(KernelParameter::line)
        .collect();
    if missing.is_empty() {
        return Ok(missing);
    }

    let mut text = String::new();
    if !current.is_empty() && !current.ends_with('\n') {
        text.push('\n');
    }
    for line in &missing {
        text.push_str(line);
        text.push('\n');
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(text.as_bytes()))
        .map_err(|e| DeployError::io(path, e))?;
    Ok(missing)
}

/// Run the tuning stage: append, load, and read back every parameter.
pub async fn run(
    runner: &dyn ProcessRunner,
    path: &Path,
    params: &[KernelParameter],
) -> Result<(), DeployError> {
    let appended = append_missing(path, params)?;
    info!(file = %path.display(), appended = appended.len(), "kernel parameters written");

    let load = StructuredCommand::new("sysctl").arg("-p").arg(path.to_string_lossy());
    let fail = |message: String| DeployError::TuningApplyFailure {
        message,
        fix: format!("Check {} for invalid entries and run `sysctl -p` manually", path.display()),
    };
    let output = runner.run(&load).await.map_err(|e| fail(e.to_string()))?;
    if !output.success() {
        return Err(fail(format!(
            "`{load}` exited with {:?}: {}",
            output.exit_code,
            output.stderr.trim()
        )));
    }

    for param in params {
        let read = StructuredCommand::new("sysctl").args(["-n", param.key.as_str()]);
        let output = runner.run(&read).await.map_err(|e| fail(e.to_string()))?;
        if !output.success() {
            return Err(fail(format!("could not read back {}", param.key)));
        }
        info!(key = %param.key, value = %output.stdout.trim(), target_value = %param.value, "kernel parameter active");
    }
    Ok(())
}
