//! Terminal output for a run.

use crate::{DeployProgress, PipelineFailure, RunSummary};
use console::Style;
use std::fmt::Write;

/// The console line for a progress event, if it gets one.
///
/// Stage starts, repeat attempts and warnings are shown. Warnings carry the
/// label of the stage that raised them.
pub fn progress_line(progress: &DeployProgress) -> Option<String> {
    match progress {
        DeployProgress::StageStarted { stage } => Some(format!(
            "{} {}",
            console::style("==>").cyan().bold(),
            stage.display_name()
        )),
        DeployProgress::Attempt {
            attempt,
            max_attempts,
            ..
        } if *attempt > 1 => Some(format!(
            "    {}",
            Style::new().dim().apply_to(format!("attempt {attempt}/{max_attempts}"))
        )),
        DeployProgress::Warning { message, .. } => {
            let label = progress.stage().map(|stage| stage.label()).unwrap_or_default();
            Some(format!(
                "    {} {message}",
                console::style(format!("warning [{label}]:")).yellow().bold()
            ))
        }
        _ => None,
    }
}

/// The success banner: console URL, observed status and port, license
/// outcome and log location.
pub fn success_banner(summary: &RunSummary) -> String {
    let bold = Style::new().bold();
    let green = Style::new().green().bold();
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", green.apply_to("Deployment complete"));
    if let Some(platform) = &summary.platform {
        let _ = writeln!(out, "  {} {}", bold.apply_to("Host:"), platform);
    }
    let _ = writeln!(out, "  {} {}", bold.apply_to("Console:"), summary.url);
    let _ = writeln!(
        out,
        "  {} HTTP {} on port {}",
        bold.apply_to("Status:"),
        summary.http_status,
        summary.endpoint.port
    );
    if let Some(license) = &summary.license {
        let line = match license.warning() {
            Some(_) => Style::new().yellow().apply_to(license.to_string()).to_string(),
            None => license.to_string(),
        };
        let _ = writeln!(out, "  {} {}", bold.apply_to("License:"), line);
    }
    let _ = writeln!(
        out,
        "  {} {:.1?}",
        bold.apply_to("Elapsed:"),
        summary.total_elapsed()
    );
    let _ = writeln!(out, "  {} {}", bold.apply_to("Log:"), summary.log_file.display());
    out
}

/// The stage-labeled failure message with its fix and the log location.
pub fn failure_message(failure: &PipelineFailure) -> String {
    let red = Style::new().red().bold();
    let bold = Style::new().bold();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} [{}] {}",
        red.apply_to("Deployment failed"),
        failure.stage.label(),
        failure.error
    );
    let _ = writeln!(out, "  {} {}", bold.apply_to("Fix:"), failure.error.fix_suggestion());
    let _ = writeln!(
        out,
        "  {} {}",
        bold.apply_to("Full log:"),
        failure.log_file.display()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::{LicenseOutcome, LicenseState};
    use crate::{DeployError, ServiceEndpoint, Stage};
    use std::path::PathBuf;
    use std::time::Duration;

    fn summary(license: LicenseOutcome) -> RunSummary {
        RunSummary {
            platform: None,
            endpoint: ServiceEndpoint {
                host: "10.0.0.5".parse().unwrap(),
                port: 8443,
            },
            url: "http://10.0.0.5:8443/console/".to_string(),
            http_status: 200,
            license: Some(license),
            log_file: PathBuf::from("/var/log/vendor-deploy.log"),
            timings: vec![(Stage::Readiness, Duration::from_secs(3))],
        }
    }

    #[test]
    fn test_banner_shows_url_status_and_port() {
        let text = console::strip_ansi_codes(&success_banner(&summary(
            LicenseOutcome::AlreadyLicensed(LicenseState::Valid),
        )))
        .to_string();
        assert!(text.contains("http://10.0.0.5:8443/console/"));
        assert!(text.contains("HTTP 200 on port 8443"));
        assert!(text.contains("valid (already installed)"));
        assert!(text.contains("/var/log/vendor-deploy.log"));
    }

    #[test]
    fn test_banner_shows_unresolved_license() {
        let text = console::strip_ansi_codes(&success_banner(&summary(LicenseOutcome::Unresolved {
            state: LicenseState::Missing,
            reason: "no license was provided".to_string(),
        })))
        .to_string();
        assert!(text.contains("missing (no license was provided)"));
    }

    #[test]
    fn test_progress_lines() {
        let line = |progress: DeployProgress| {
            progress_line(&progress).map(|text| console::strip_ansi_codes(&text).to_string())
        };

        assert_eq!(
            line(DeployProgress::StageStarted { stage: Stage::Readiness }).as_deref(),
            Some("==> Waiting for service")
        );
        assert_eq!(
            line(DeployProgress::Warning {
                stage: Stage::License,
                message: "no license was provided".to_string(),
            })
            .as_deref(),
            Some("    warning [license]: no license was provided")
        );
        assert_eq!(
            line(DeployProgress::Attempt {
                stage: Stage::Readiness,
                attempt: 2,
                max_attempts: 30,
            })
            .as_deref(),
            Some("    attempt 2/30")
        );
        assert_eq!(
            line(DeployProgress::Attempt {
                stage: Stage::Readiness,
                attempt: 1,
                max_attempts: 30,
            }),
            None
        );
    }

    #[test]
    fn test_failure_names_stage_fix_and_log() {
        let failure = PipelineFailure {
            stage: Stage::RunInstaller,
            error: DeployError::VendorInstallerFailure {
                message: "installer exited with code 3".to_string(),
                exit_code: Some(3),
                fix: "See the installer output in the log".to_string(),
            },
            log_file: PathBuf::from("/var/log/vendor-deploy.log"),
        };
        let text = console::strip_ansi_codes(&failure_message(&failure)).to_string();
        assert!(text.contains("[run-installer]"));
        assert!(text.contains("See the installer output in the log"));
        assert!(text.contains("Full log: /var/log/vendor-deploy.log"));
    }
}
