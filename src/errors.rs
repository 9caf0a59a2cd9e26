//! Error types for deployment operations.
//!
//! Every stage of the pipeline reports failure as a [`DeployError`]. Each
//! variant carries an actionable `fix` suggestion that the run reporter
//! prints next to the stage label.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while deploying the product.
///
/// All variants except [`DeployError::LicenseUnresolved`] are fatal: the
/// pipeline aborts at the stage that produced them and the process exits
/// non-zero.
///
/// # Example
///
/// ```rust
/// use vendor_deploy::DeployError;
///
/// fn handle_error(error: DeployError) {
///     eprintln!("Deployment failed: {}", error);
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeployError {
    /// The host is not one of the certified distributions or is too old.
    #[error("Unsupported operating system: {found}")]
    UnsupportedOperatingSystem {
        /// Description of the detected host (e.g., "rhel 8.1").
        found: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The process is not running with administrative rights.
    #[error("Insufficient privilege: running as uid {euid}, root required")]
    InsufficientPrivilege {
        /// Effective UID of the process.
        euid: u32,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An OS package or runtime dependency could not be installed.
    #[error("Dependency installation failed: {message}")]
    DependencyInstallFailure {
        /// Description of the failing step.
        message: String,
        /// Exit code from the failing command, if available.
        exit_code: Option<i32>,
        /// Standard error from the failing command, if available.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// No vendor archive was found in the working directory.
    #[error("No vendor archive found in {}", dir.display())]
    ArchiveNotFound {
        /// Directory that was scanned.
        dir: PathBuf,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// More than one vendor archive was found in the working directory.
    #[error("Multiple vendor archives found in {}: {}", dir.display(), found.join(", "))]
    MultipleArchives {
        /// Directory that was scanned.
        dir: PathBuf,
        /// File names of every matching archive, sorted.
        found: Vec<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The vendor archive could not be unpacked.
    #[error("Failed to extract {}: {message}", archive.display())]
    ArchiveExtractFailure {
        /// The archive being extracted.
        archive: PathBuf,
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The extracted archive does not contain the vendor install entry point.
    #[error("Installer '{name}' not found under {}", searched.display())]
    InstallerNotFound {
        /// File name of the expected entry point.
        name: String,
        /// Root of the tree that was searched.
        searched: PathBuf,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The vendor installer exited unsuccessfully or could not be started.
    #[error("Vendor installer failed: {message}")]
    VendorInstallerFailure {
        /// Description of the failure.
        message: String,
        /// Exit code from the installer, if available.
        exit_code: Option<i32>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Kernel parameters could not be written or loaded.
    #[error("System tuning failed: {message}")]
    TuningApplyFailure {
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The monitoring daemon could not be configured or restarted.
    #[error("Monitoring configuration failed: {message}")]
    MonitoringConfigFailure {
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// No valid license was observed within the retry budget.
    ///
    /// This is the only non-fatal variant: it is logged as a warning and
    /// the run continues.
    #[error("License unresolved: {reason}")]
    LicenseUnresolved {
        /// Why the license could not be confirmed.
        reason: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The service never answered its console health check.
    #[error("Service not ready after {attempts} attempts ({elapsed:?})")]
    ReadinessTimeout {
        /// Number of polls performed.
        attempts: u32,
        /// Wall-clock time spent polling.
        elapsed: Duration,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

impl DeployError {
    /// Get an actionable suggestion for fixing this error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vendor_deploy::DeployError;
    ///
    /// let error = DeployError::InsufficientPrivilege {
    ///     euid: 1000,
    ///     fix: "Re-run with sudo".to_string(),
    /// };
    /// assert_eq!(error.fix_suggestion(), "Re-run with sudo");
    /// ```
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::UnsupportedOperatingSystem { fix, .. } => fix,
            Self::InsufficientPrivilege { fix, .. } => fix,
            Self::DependencyInstallFailure { fix, .. } => fix,
            Self::ArchiveNotFound { fix, .. } => fix,
            Self::MultipleArchives { fix, .. } => fix,
            Self::ArchiveExtractFailure { fix, .. } => fix,
            Self::InstallerNotFound { fix, .. } => fix,
            Self::VendorInstallerFailure { fix, .. } => fix,
            Self::TuningApplyFailure { fix, .. } => fix,
            Self::MonitoringConfigFailure { fix, .. } => fix,
            Self::LicenseUnresolved { fix, .. } => fix,
            Self::ReadinessTimeout { fix, .. } => fix,
            Self::Io { fix, .. } => fix,
        }
    }

    /// Whether this error aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::LicenseUnresolved { .. })
    }

    /// Wrap an I/O error with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        let fix = if source.kind() == std::io::ErrorKind::PermissionDenied {
            format!("Check permissions on {}", path.display())
        } else {
            format!("Check that {} is accessible", path.display())
        };
        Self::Io { path, source, fix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_not_found_display() {
        let error = DeployError::ArchiveNotFound {
            dir: PathBuf::from("/root/media"),
            fix: "Copy the archive here".to_string(),
        };
        assert_eq!(error.to_string(), "No vendor archive found in /root/media");
    }

    #[test]
    fn test_multiple_archives_display_lists_names() {
        let error = DeployError::MultipleArchives {
            dir: PathBuf::from("/srv"),
            found: vec!["a.tgz".to_string(), "b.zip".to_string()],
            fix: "Keep one archive".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("a.tgz, b.zip"));
    }

    #[test]
    fn test_only_license_unresolved_is_non_fatal() {
        let warning = DeployError::LicenseUnresolved {
            reason: "budget exhausted".to_string(),
            fix: "Install a license later".to_string(),
        };
        assert!(!warning.is_fatal());

        let fatal = DeployError::ReadinessTimeout {
            attempts: 30,
            elapsed: Duration::from_secs(300),
            fix: "Check the service logs".to_string(),
        };
        assert!(fatal.is_fatal());
    }

    #[test]
    fn test_io_helper_suggests_permissions() {
        let error = DeployError::io(
            "/etc/sysctl.conf",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(error.fix_suggestion().contains("permissions"));
        assert!(error.to_string().contains("/etc/sysctl.conf"));
    }

    #[test]
    fn test_all_variants_have_fix() {
        let errors = vec![
            DeployError::UnsupportedOperatingSystem {
                found: "ubuntu 22.04".to_string(),
                fix: "Use a certified distribution".to_string(),
            },
            DeployError::InsufficientPrivilege {
                euid: 1000,
                fix: "Run as root".to_string(),
            },
            DeployError::DependencyInstallFailure {
                message: "dnf failed".to_string(),
                exit_code: Some(1),
                stderr: None,
                fix: "Check repositories".to_string(),
            },
            DeployError::ArchiveExtractFailure {
                archive: PathBuf::from("x.tgz"),
                message: "truncated".to_string(),
                fix: "Re-download".to_string(),
            },
            DeployError::InstallerNotFound {
                name: "install.sh".to_string(),
                searched: PathBuf::from("/opt/extract"),
                fix: "Check the archive".to_string(),
            },
            DeployError::VendorInstallerFailure {
                message: "exit 3".to_string(),
                exit_code: Some(3),
                fix: "See installer output".to_string(),
            },
            DeployError::TuningApplyFailure {
                message: "sysctl -p failed".to_string(),
                fix: "Check /etc/sysctl.conf".to_string(),
            },
            DeployError::MonitoringConfigFailure {
                message: "restart failed".to_string(),
                fix: "Check snmpd".to_string(),
            },
        ];

        for error in errors {
            assert!(
                !error.fix_suggestion().is_empty(),
                "fix_suggestion() should be non-empty for {:?}",
                error
            );
        }
    }
}
