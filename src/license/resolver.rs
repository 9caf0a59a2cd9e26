//! The license stage: check, request, install, re-check.

use super::source::{LicenseSource, LicenseSupply};
use super::state::{current_state, LicenseState};
use crate::http::HttpProbe;
use crate::runner::{ProcessRunner, StructuredCommand};
use crate::{retry_until, DeployError, DeployProgress, ProductProfile, RetryBudget, Stage};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// How the license stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseOutcome {
    /// The product was already licensed; nothing was requested.
    AlreadyLicensed(LicenseState),

    /// A new license was installed and observed as valid.
    Resolved {
        /// The state that ended the loop.
        state: LicenseState,
        /// Polls needed to observe it.
        attempts: u32,
    },

    /// No valid license could be confirmed. The run continues.
    Unresolved {
        /// The last state observed.
        state: LicenseState,
        /// What went wrong.
        reason: String,
    },
}

impl LicenseOutcome {
    /// The non-fatal warning for an unresolved license, if any.
    pub fn warning(&self) -> Option<DeployError> {
        match self {
            Self::Unresolved { reason, .. } => Some(DeployError::LicenseUnresolved {
                reason: reason.clone(),
                fix: "Install a valid license certificate and restart the service".to_string(),
            }),
            _ => None,
        }
    }

    /// The state the stage ended with.
    pub fn state(&self) -> LicenseState {
        match self {
            Self::AlreadyLicensed(state) => *state,
            Self::Resolved { state, .. } | Self::Unresolved { state, .. } => *state,
        }
    }
}

impl fmt::Display for LicenseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyLicensed(state) => write!(f, "{state} (already installed)"),
            Self::Resolved { state, attempts } => write!(f, "{state} (confirmed after {attempts} checks)"),
            Self::Unresolved { state, reason } => write!(f, "{state} ({reason})"),
        }
    }
}

/// Everything the license stage talks to.
pub struct LicenseResolver<'a> {
    /// Status endpoint client.
    pub http: &'a dyn HttpProbe,
    /// Used to restart the service after installing a license.
    pub runner: &'a dyn ProcessRunner,
    /// Where a new license comes from.
    pub source: &'a dyn LicenseSource,
    /// Product constants.
    pub profile: &'a ProductProfile,
    /// Where the certificate lives.
    pub certificate: &'a Path,
    /// Re-check budget after installing.
    pub budget: RetryBudget,
}

impl LicenseResolver<'_> {
    /// Run the stage. Never fails: problems end in
    /// [`LicenseOutcome::Unresolved`].
    pub async fn resolve<F>(&self, on_progress: F) -> LicenseOutcome
    where
        F: Fn(DeployProgress) + Send + Sync,
    {
        let initial = self.state().await;
        info!(state = %initial, "license state checked");
        if !initial.needs_license() {
            return LicenseOutcome::AlreadyLicensed(initial);
        }

        let unresolved = |state: LicenseState, reason: String| {
            warn!(state = %state, %reason, "license unresolved");
            LicenseOutcome::Unresolved { state, reason }
        };

        let supply = match self.source.request_license().await {
            Ok(supply) if supply.is_empty() => {
                return unresolved(initial, "no license was provided".to_string())
            }
            Ok(supply) => supply,
            Err(e) => return unresolved(initial, format!("could not read license input: {e}")),
        };

        if let Err(e) = self.install(&supply) {
            return unresolved(initial, e.to_string());
        }

        self.restart_service(&on_progress).await;

        let polled = retry_until(self.budget, |attempt| {
            on_progress(DeployProgress::Attempt {
                stage: Stage::License,
                attempt,
                max_attempts: self.budget.max_attempts,
            });
            async move {
                let state = self.state().await;
                info!(attempt, state = %state, "license re-checked");
                if state == LicenseState::Valid {
                    Ok(state)
                } else {
                    Err(state)
                }
            }
        })
        .await;

        match polled {
            Ok(settled) => LicenseOutcome::Resolved {
                state: settled.value,
                attempts: settled.attempts,
            },
            Err(exhausted) => unresolved(
                exhausted.last,
                format!(
                    "license still {} after {} checks ({:?})",
                    exhausted.last, exhausted.attempts, exhausted.elapsed
                ),
            ),
        }
    }

    async fn state(&self) -> LicenseState {
        current_state(
            self.http,
            self.certificate,
            &self.profile.certificate_marker,
            &self.profile.license_status_url(),
        )
        .await
    }

    /// Write the supplied license to the certificate location.
    fn install(&self, supply: &LicenseSupply) -> Result<(), DeployError> {
        if let Some(parent) = self.certificate.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))?;
        }
        match supply {
            LicenseSupply::Path(source) => {
                std::fs::copy(source, self.certificate).map_err(|e| DeployError::io(source, e))?;
            }
            LicenseSupply::Content(text) => {
                std::fs::write(self.certificate, text)
                    .map_err(|e| DeployError::io(self.certificate, e))?;
            }
        }
        info!(certificate = %self.certificate.display(), "license certificate installed");
        Ok(())
    }

    async fn restart_service<F>(&self, on_progress: &F)
    where
        F: Fn(DeployProgress) + Send + Sync,
    {
        let cmd = StructuredCommand::new("systemctl").args(["restart", self.profile.service_unit.as_str()]);
        let problem = match self.runner.run(&cmd).await {
            Ok(output) if output.success() => return,
            Ok(output) => format!("`{cmd}` exited with {:?}", output.exit_code),
            Err(e) => e.to_string(),
        };
        warn!(%problem, "service restart failed, polling anyway");
        on_progress(DeployProgress::Warning {
            stage: Stage::License,
            message: problem,
        });
    }
}
