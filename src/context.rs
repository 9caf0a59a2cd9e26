//! Run-scoped state shared by the stages.

use crate::license::LicenseOutcome;
use crate::HostProfile;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Where the deployed service can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Externally reachable address of this host.
    pub host: IpAddr,

    /// Port the service listens on.
    pub port: u16,
}

impl ServiceEndpoint {
    /// HTTP URL for `path` on this endpoint.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vendor_deploy::ServiceEndpoint;
    ///
    /// let endpoint = ServiceEndpoint { host: "10.0.0.5".parse().unwrap(), port: 8443 };
    /// assert_eq!(endpoint.url("/console/"), "http://10.0.0.5:8443/console/");
    ///
    /// let v6 = ServiceEndpoint { host: "fd00::5".parse().unwrap(), port: 80 };
    /// assert_eq!(v6.url("/"), "http://[fd00::5]:80/");
    /// ```
    pub fn url(&self, path: &str) -> String {
        format!("http://{self}{path}")
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host {
            IpAddr::V4(ip) => write!(f, "{ip}:{}", self.port),
            IpAddr::V6(ip) => write!(f, "[{ip}]:{}", self.port),
        }
    }
}

/// State of a single deployment run.
///
/// Owned by the pipeline and passed by `&mut` to each stage. Every field
/// has exactly one writer stage; the endpoint fields are write-once.
#[derive(Debug, Default)]
pub struct InstallationContext {
    /// Directory scanned for the vendor archive.
    pub workdir: PathBuf,

    /// Run log location, for the final report.
    pub log_file: PathBuf,

    /// Detected host. Written by `preflight`.
    pub platform: Option<HostProfile>,

    /// Vendor archive. Written by `locate-archive`.
    pub archive: Option<PathBuf>,

    /// Installer inside the extraction tree. Written by `extract-archive`.
    pub extracted_installer: Option<PathBuf>,

    /// Installer inside the staging directory. Written by `stage-installer`.
    pub staged_installer: Option<PathBuf>,

    /// License result. Written by `license`.
    pub license: Option<LicenseOutcome>,

    /// Status code of the successful console probe. Written by `readiness`.
    pub http_status: Option<u16>,

    port: OnceLock<u16>,
    host: OnceLock<IpAddr>,
}

impl InstallationContext {
    /// Fresh context for a run.
    pub fn new(workdir: impl Into<PathBuf>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            log_file: log_file.into(),
            ..Default::default()
        }
    }

    /// Record the service port. The first recorded value wins and is
    /// returned on every later call.
    pub fn record_port(&self, port: u16) -> u16 {
        *self.port.get_or_init(|| port)
    }

    /// Record the server address. The first recorded value wins.
    pub fn record_host(&self, host: IpAddr) -> IpAddr {
        *self.host.get_or_init(|| host)
    }

    /// Discovered port, if any.
    pub fn port(&self) -> Option<u16> {
        self.port.get().copied()
    }

    /// Discovered address, if any.
    pub fn host(&self) -> Option<IpAddr> {
        self.host.get().copied()
    }

    /// Endpoint once both halves are known.
    pub fn endpoint(&self) -> Option<ServiceEndpoint> {
        Some(ServiceEndpoint {
            host: self.host()?,
            port: self.port()?,
        })
    }
}
