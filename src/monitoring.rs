//! SNMP agentx socket configuration.

use crate::runner::{ProcessRunner, StructuredCommand};
use crate::DeployError;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// What [`ensure_agentx`] did to the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentxChange {
    /// A socket directive was already present.
    AlreadyConfigured,
    /// The two agentx lines were appended to an existing file.
    Appended,
    /// The file did not exist and was created with the two lines.
    Created,
}

const MASTER_AGENTX: &str = "master agentx";

fn has_socket_directive(contents: &str) -> bool {
    contents.lines().any(|line| {
        line.split_whitespace()
            .next()
            .is_some_and(|word| word.eq_ignore_ascii_case("agentXSocket"))
    })
}

/// Make sure `path` enables the agentx master with `socket_directive`.
pub fn ensure_agentx(path: &Path, socket_directive: &str) -> Result<AgentxChange, DeployError> {
    let lines = format!("{MASTER_AGENTX}\n{socket_directive}\n");

    match std::fs::read_to_string(path) {
        Ok(current) if has_socket_directive(&current) => Ok(AgentxChange::AlreadyConfigured),
        Ok(current) => {
            let separator = if current.is_empty() || current.ends_with('\n') { "" } else { "\n" };
            std::fs::OpenOptions::new()
                .append(true)
                .open(path)
                .and_then(|mut file| write!(file, "{separator}{lines}"))
                .map_err(|e| DeployError::io(path, e))?;
            Ok(AgentxChange::Appended)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))?;
            }
            std::fs::write(path, lines).map_err(|e| DeployError::io(path, e))?;
            Ok(AgentxChange::Created)
        }
        Err(e) => Err(DeployError::io(path, e)),
    }
}

/// Run the monitoring stage: configure, then enable and restart the daemon.
pub async fn run(
    runner: &dyn ProcessRunner,
    path: &Path,
    socket_directive: &str,
    unit: &str,
) -> Result<AgentxChange, DeployError> {
    let change = ensure_agentx(path, socket_directive)?;
    info!(file = %path.display(), change = ?change, "agentx socket configured");

    for action in ["enable", "restart"] {
        let cmd = StructuredCommand::new("systemctl").args([action, unit]);
        let fail = |message: String| DeployError::MonitoringConfigFailure {
            message,
            fix: format!("Inspect `journalctl -u {unit}` and {}", path.display()),
        };
        let output = runner.run(&cmd).await.map_err(|e| fail(e.to_string()))?;
        if !output.success() {
            return Err(fail(format!(
                "`{cmd}` exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
    }
    info!(unit, "monitoring daemon restarted");
    Ok(change)
}
