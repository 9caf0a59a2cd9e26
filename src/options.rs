//! Deployment options.
//!
//! [`DeployOptions`] collects the filesystem contract, the two retry
//! budgets and the address-selection policy. Use [`Default::default()`]
//! for the production values and override individual fields in tests or
//! from the command line.

use crate::readiness::AddressPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Attempts and spacing for a bounded retry loop.
///
/// # Example
///
/// ```rust
/// use vendor_deploy::RetryBudget;
/// use std::time::Duration;
///
/// let budget = RetryBudget::license();
/// assert_eq!(budget.max_attempts, 12);
/// assert_eq!(budget.total(), Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Number of probes before giving up. Always at least one probe is made.
    pub max_attempts: u32,

    /// Sleep between consecutive probes.
    pub interval: Duration,
}

impl RetryBudget {
    /// Create a budget of `max_attempts` probes spaced `interval` apart.
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// License propagation: 12 attempts, 10 seconds apart.
    pub const fn license() -> Self {
        Self::new(12, Duration::from_secs(10))
    }

    /// Service startup: 30 attempts, 10 seconds apart.
    pub const fn readiness() -> Self {
        Self::new(30, Duration::from_secs(10))
    }

    /// Nominal length of the whole budget.
    pub fn total(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Fixed filesystem locations touched by a run.
///
/// Each path is written by exactly one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPaths {
    /// Host identity file read by preflight.
    pub os_release: PathBuf,

    /// Isolated runtime environment, recreated on every run.
    pub runtime_env: PathBuf,

    /// Where the vendor archive is unpacked, recreated on every run.
    pub extract_dir: PathBuf,

    /// Isolated directory the vendor installer runs from.
    pub staging_dir: PathBuf,

    /// Append-only run log.
    pub log_file: PathBuf,

    /// License certificate read and written by the license resolver.
    pub certificate: PathBuf,

    /// Kernel parameter file.
    pub sysctl_conf: PathBuf,

    /// SNMP daemon configuration.
    pub snmpd_conf: PathBuf,
}

impl Default for DeployPaths {
    fn default() -> Self {
        Self {
            os_release: PathBuf::from("/etc/os-release"),
            runtime_env: PathBuf::from("/opt/vendor-deploy/venv"),
            extract_dir: PathBuf::from("/opt/vendor-deploy/extract"),
            staging_dir: PathBuf::from("/opt/vendor-deploy/installer"),
            log_file: PathBuf::from("/var/log/vendor-deploy.log"),
            certificate: PathBuf::from("/etc/vendor-server/license.cert"),
            sysctl_conf: PathBuf::from("/etc/sysctl.conf"),
            snmpd_conf: PathBuf::from("/etc/snmp/snmpd.conf"),
        }
    }
}

impl DeployPaths {
    /// Re-root every path under `root`. Used to sandbox a run.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vendor_deploy::DeployPaths;
    /// use std::path::Path;
    ///
    /// let paths = DeployPaths::default().rooted_at("/tmp/sandbox");
    /// assert_eq!(paths.sysctl_conf, Path::new("/tmp/sandbox/etc/sysctl.conf"));
    /// ```
    pub fn rooted_at(&self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let reroot = |p: &PathBuf| root.join(p.strip_prefix("/").unwrap_or(p));
        Self {
            os_release: reroot(&self.os_release),
            runtime_env: reroot(&self.runtime_env),
            extract_dir: reroot(&self.extract_dir),
            staging_dir: reroot(&self.staging_dir),
            log_file: reroot(&self.log_file),
            certificate: reroot(&self.certificate),
            sysctl_conf: reroot(&self.sysctl_conf),
            snmpd_conf: reroot(&self.snmpd_conf),
        }
    }
}

/// Configuration for a deployment run.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Directory scanned for the vendor archive.
    pub workdir: PathBuf,

    /// Filesystem contract.
    pub paths: DeployPaths,

    /// Budget for re-checking the license after a new one is installed.
    pub license_budget: RetryBudget,

    /// Budget for waiting on the service console.
    pub readiness_budget: RetryBudget,

    /// How the advertised server address is chosen.
    pub address_policy: AddressPolicy,

    /// Timeout for individual HTTP probes.
    ///
    /// Default: 10 seconds.
    pub http_timeout: Duration,

    /// Kill any single external command that runs longer than this.
    ///
    /// Default: `None`. The vendor installer may prompt and wait on the
    /// operator, so no limit applies unless one is asked for.
    pub command_timeout: Option<Duration>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            paths: DeployPaths::default(),
            license_budget: RetryBudget::license(),
            readiness_budget: RetryBudget::readiness(),
            address_policy: AddressPolicy::default(),
            http_timeout: Duration::from_secs(10),
            command_timeout: None,
        }
    }
}
