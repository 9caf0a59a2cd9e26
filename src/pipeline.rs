//! The stage controller.
//!
//! [`Deployer::run`] executes every [`Stage`] in order against one
//! [`InstallationContext`]. A stage either continues or aborts the whole
//! run; the controller itself never skips or retries a stage.

use crate::http::HttpProbe;
use crate::license::{LicenseOutcome, LicenseResolver, LicenseSource};
use crate::readiness::ReadinessPoller;
use crate::runner::ProcessRunner;
use crate::vendor::{self, ArchiveFormat};
use crate::{
    monitoring, preflight, provision, tuning, DeployError, DeployOptions, DeployProgress,
    HostProfile, InstallationContext, ProductProfile, ServiceEndpoint, Stage,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// What a stage hands back to the controller.
#[derive(Debug)]
pub enum StageOutcome {
    /// Proceed to the next stage.
    Continue,
    /// Stop the run.
    Abort(DeployError),
}

impl From<Result<(), DeployError>> for StageOutcome {
    fn from(result: Result<(), DeployError>) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(error) => Self::Abort(error),
        }
    }
}

/// A run that stopped at a stage.
#[derive(Debug, Error)]
#[error("stage '{}' failed: {error}", stage.label())]
pub struct PipelineFailure {
    /// The stage that aborted.
    pub stage: Stage,
    /// Why.
    #[source]
    pub error: DeployError,
    /// The run log.
    pub log_file: PathBuf,
}

/// Facts about a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The validated host.
    pub platform: Option<HostProfile>,
    /// Where the console answered.
    pub endpoint: ServiceEndpoint,
    /// Console URL.
    pub url: String,
    /// Status code of the successful console probe.
    pub http_status: u16,
    /// How the license stage ended.
    pub license: Option<LicenseOutcome>,
    /// The run log.
    pub log_file: PathBuf,
    /// Wall-clock time of each stage, in execution order.
    pub timings: Vec<(Stage, Duration)>,
}

impl RunSummary {
    /// Sum of all stage timings.
    pub fn total_elapsed(&self) -> Duration {
        self.timings.iter().map(|(_, elapsed)| *elapsed).sum()
    }
}

/// Deploys the product onto this host.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use vendor_deploy::{
///     Deployer, DeployOptions, ProductProfile, ReqwestProbe, SystemRunner, TerminalLicenseSource,
/// };
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let options = DeployOptions::default();
///     let http = ReqwestProbe::new(options.http_timeout).unwrap();
///     let deployer = Deployer::new(
///         options,
///         ProductProfile::default(),
///         Arc::new(SystemRunner::new()),
///         Arc::new(http),
///         Arc::new(TerminalLicenseSource),
///     );
///
///     match deployer.run(|progress| println!("{}", progress.description())).await {
///         Ok(summary) => println!("Console at {}", summary.url),
///         Err(failure) => println!("{}. Fix: {}", failure, failure.error.fix_suggestion()),
///     }
/// }
/// ```
pub struct Deployer {
    options: DeployOptions,
    profile: ProductProfile,
    runner: Arc<dyn ProcessRunner>,
    http: Arc<dyn HttpProbe>,
    license_source: Arc<dyn LicenseSource>,
    euid: u32,
}

impl Deployer {
    /// Create a deployer acting with this process's effective UID.
    pub fn new(
        options: DeployOptions,
        profile: ProductProfile,
        runner: Arc<dyn ProcessRunner>,
        http: Arc<dyn HttpProbe>,
        license_source: Arc<dyn LicenseSource>,
    ) -> Self {
        Self {
            options,
            profile,
            runner,
            http,
            license_source,
            euid: preflight::effective_uid(),
        }
    }

    /// Check privilege against `euid` instead of the real effective UID.
    pub fn with_euid(mut self, euid: u32) -> Self {
        self.euid = euid;
        self
    }

    /// The options this deployer runs with.
    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Run every stage in order.
    ///
    /// Stops at the first stage that aborts. An unresolved license is
    /// reported through `on_progress` as a warning and does not stop the
    /// run.
    pub async fn run<F>(&self, on_progress: F) -> Result<RunSummary, PipelineFailure>
    where
        F: Fn(DeployProgress) + Send + Sync,
    {
        let log_file = self.options.paths.log_file.clone();
        let mut ctx = InstallationContext::new(&self.options.workdir, &log_file);
        let mut timings = Vec::new();

        info!(
            product = %self.profile.display_name,
            workdir = %ctx.workdir.display(),
            log = %log_file.display(),
            "deployment started"
        );

        for stage in Stage::all() {
            on_progress(DeployProgress::StageStarted { stage });
            info!(stage = stage.label(), "{}", stage.display_name());
            let started = Instant::now();

            if let StageOutcome::Abort(error) = self.run_stage(stage, &mut ctx, &on_progress).await {
                return Err(self.abort(stage, error));
            }

            let elapsed = started.elapsed();
            info!(stage = stage.label(), elapsed_ms = elapsed.as_millis() as u64, "stage completed");
            timings.push((stage, elapsed));
            on_progress(DeployProgress::StageCompleted { stage, elapsed });
        }

        let (Some(endpoint), Some(http_status)) = (ctx.endpoint(), ctx.http_status) else {
            let error = DeployError::ReadinessTimeout {
                attempts: 0,
                elapsed: Duration::ZERO,
                fix: "The readiness stage finished without recording an endpoint".to_string(),
            };
            return Err(self.abort(Stage::Readiness, error));
        };

        let summary = RunSummary {
            platform: ctx.platform.take(),
            endpoint,
            url: endpoint.url(&self.profile.console_path),
            http_status,
            license: ctx.license.take(),
            log_file,
            timings,
        };
        for (stage, elapsed) in &summary.timings {
            info!(stage = stage.label(), elapsed = ?elapsed, "timing");
        }
        info!(url = %summary.url, total = ?summary.total_elapsed(), "deployment complete");
        on_progress(DeployProgress::Completed { endpoint });
        Ok(summary)
    }

    fn abort(&self, stage: Stage, error: DeployError) -> PipelineFailure {
        error!(
            stage = stage.label(),
            reason = %error,
            fix = error.fix_suggestion(),
            log = %self.options.paths.log_file.display(),
            "deployment aborted"
        );
        PipelineFailure {
            stage,
            error,
            log_file: self.options.paths.log_file.clone(),
        }
    }

    async fn run_stage<F>(&self, stage: Stage, ctx: &mut InstallationContext, on_progress: &F) -> StageOutcome
    where
        F: Fn(DeployProgress) + Send + Sync,
    {
        let paths = &self.options.paths;
        let profile = &self.profile;
        let runner = self.runner.as_ref();

        let result = match stage {
            Stage::Preflight => preflight::run(&paths.os_release, self.euid).map(|host| {
                info!(host = %host, "host validated");
                ctx.platform = Some(host);
            }),
            Stage::Dependencies => provision::run(runner, profile, &paths.runtime_env).await,
            Stage::LocateArchive => vendor::locate_archive(&ctx.workdir).map(|archive| {
                info!(archive = %archive.display(), "vendor archive found");
                ctx.archive = Some(archive);
            }),
            Stage::ExtractArchive => self.extract(ctx),
            Stage::StageInstaller => match &ctx.extracted_installer {
                Some(installer) => vendor::stage_installer(installer, &paths.staging_dir)
                    .map(|staged| ctx.staged_installer = Some(staged)),
                None => Err(self.installer_missing(&paths.extract_dir)),
            },
            Stage::RunInstaller => match &ctx.staged_installer {
                Some(staged) => vendor::run_installer(runner, staged, &paths.staging_dir).await,
                None => Err(self.installer_missing(&paths.staging_dir)),
            },
            Stage::SystemTuning => {
                tuning::run(runner, &paths.sysctl_conf, &profile.kernel_parameters).await
            }
            Stage::Monitoring => monitoring::run(
                runner,
                &paths.snmpd_conf,
                &profile.agentx_socket,
                &profile.monitoring_unit,
            )
            .await
            .map(|_| ()),
            Stage::License => {
                let resolver = LicenseResolver {
                    http: self.http.as_ref(),
                    runner,
                    source: self.license_source.as_ref(),
                    profile,
                    certificate: &paths.certificate,
                    budget: self.options.license_budget,
                };
                let outcome = resolver.resolve(on_progress).await;
                if let Some(warning) = outcome.warning() {
                    warn!(reason = %warning, fix = warning.fix_suggestion(), "continuing without a valid license");
                    on_progress(DeployProgress::Warning {
                        stage,
                        message: warning.to_string(),
                    });
                }
                ctx.license = Some(outcome);
                Ok(())
            }
            Stage::Readiness => {
                let poller = ReadinessPoller {
                    runner,
                    http: self.http.as_ref(),
                    profile,
                    policy: &self.options.address_policy,
                    budget: self.options.readiness_budget,
                };
                poller.wait(ctx, on_progress).await.map(|_| ())
            }
        };
        result.into()
    }

    fn extract(&self, ctx: &mut InstallationContext) -> Result<(), DeployError> {
        let paths = &self.options.paths;
        let archive = ctx.archive.clone().ok_or_else(|| DeployError::ArchiveNotFound {
            dir: ctx.workdir.clone(),
            fix: "Copy the vendor archive into the working directory".to_string(),
        })?;
        let format = ArchiveFormat::from_path(&archive).ok_or_else(|| DeployError::ArchiveExtractFailure {
            archive: archive.clone(),
            message: "unrecognized archive format".to_string(),
            fix: "Provide a .tar.gz, .tgz, .tar or .zip archive".to_string(),
        })?;

        vendor::extract(&archive, format, &paths.extract_dir)?;
        let installer = vendor::find_installer(&paths.extract_dir, &self.profile.installer_name)?;
        info!(installer = %installer.display(), "installer found");
        ctx.extracted_installer = Some(installer);
        Ok(())
    }

    fn installer_missing(&self, searched: &std::path::Path) -> DeployError {
        DeployError::InstallerNotFound {
            name: self.profile.installer_name.clone(),
            searched: searched.to_path_buf(),
            fix: "Re-run the deployment from the beginning".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_outcome_from_result() {
        assert!(matches!(StageOutcome::from(Ok(())), StageOutcome::Continue));
        let abort = StageOutcome::from(Err(DeployError::TuningApplyFailure {
            message: "sysctl -p failed".to_string(),
            fix: "Check /etc/sysctl.conf".to_string(),
        }));
        assert!(matches!(abort, StageOutcome::Abort(DeployError::TuningApplyFailure { .. })));
    }

    #[test]
    fn test_failure_display_names_stage() {
        let failure = PipelineFailure {
            stage: Stage::LocateArchive,
            error: DeployError::ArchiveNotFound {
                dir: PathBuf::from("/srv/media"),
                fix: "Copy the archive".to_string(),
            },
            log_file: PathBuf::from("/var/log/vendor-deploy.log"),
        };
        assert_eq!(
            failure.to_string(),
            "stage 'locate-archive' failed: No vendor archive found in /srv/media"
        );
    }

    #[test]
    fn test_summary_total_elapsed() {
        let summary = RunSummary {
            platform: None,
            endpoint: ServiceEndpoint {
                host: "10.0.0.5".parse().unwrap(),
                port: 8443,
            },
            url: "http://10.0.0.5:8443/console/".to_string(),
            http_status: 200,
            license: None,
            log_file: PathBuf::from("/var/log/vendor-deploy.log"),
            timings: vec![
                (Stage::Preflight, Duration::from_millis(5)),
                (Stage::Readiness, Duration::from_secs(20)),
            ],
        };
        assert_eq!(summary.total_elapsed(), Duration::from_millis(20_005));
    }
}
