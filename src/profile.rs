//! Product profile: everything that names the deployed product.
//!
//! The built-in [`ProductProfile::default()`] describes the certified
//! package set, installer entry point, service units and endpoints. A YAML
//! file may override any subset of fields; missing fields keep their
//! defaults.

use semver::VersionReq;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Path of the license status API on the local service.
pub const LICENSE_STATUS_PATH: &str = "/api/license/status";

/// Errors loading a product profile.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileError {
    /// The profile file could not be read.
    #[error("failed to read profile {}: {source}", path.display())]
    Read {
        /// The profile path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The profile file is not valid YAML for this schema.
    #[error("failed to parse profile {}: {source}", path.display())]
    Parse {
        /// The profile path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The profile parsed but a field has an unusable value.
    #[error("invalid profile: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

/// The pinned language runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// OS package providing the runtime (e.g., "python39").
    pub package: String,

    /// Interpreter executable (e.g., "python3.9").
    pub executable: String,

    /// Pinned `major.minor` version (e.g., "3.9").
    pub version: String,
}

impl RuntimeSpec {
    /// Requirement matching any patch release of the pinned version.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vendor_deploy::ProductProfile;
    /// use semver::Version;
    ///
    /// let req = ProductProfile::default().runtime.version_req().unwrap();
    /// assert!(req.matches(&Version::new(3, 9, 18)));
    /// assert!(!req.matches(&Version::new(3, 11, 2)));
    /// ```
    pub fn version_req(&self) -> Result<VersionReq, ProfileError> {
        VersionReq::parse(&format!("~{}", self.version)).map_err(|e| ProfileError::Invalid {
            reason: format!("runtime version '{}': {e}", self.version),
        })
    }
}

/// A kernel parameter override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelParameter {
    /// Dotted sysctl key (e.g., "net.core.rmem_max").
    pub key: String,

    /// Target value.
    pub value: String,
}

impl KernelParameter {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// The `key=value` line written to the tuning file.
    pub fn line(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// Product-specific constants for a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductProfile {
    /// Human-readable product name used in messages.
    pub display_name: String,

    /// systemd unit of the installed service.
    pub service_unit: String,

    /// OS package manager program.
    pub package_manager: String,

    /// OS packages installed before anything else.
    pub os_packages: Vec<String>,

    /// 32-bit package known to conflict with the product, removed if present.
    pub conflicting_package: Option<String>,

    /// Pinned language runtime.
    pub runtime: RuntimeSpec,

    /// Pinned libraries installed into the runtime environment.
    pub libraries: Vec<String>,

    /// File name of the vendor install entry point.
    pub installer_name: String,

    /// Kernel parameter overrides.
    pub kernel_parameters: Vec<KernelParameter>,

    /// systemd unit of the SNMP daemon.
    pub monitoring_unit: String,

    /// Agent-extension socket directive for the SNMP daemon.
    pub agentx_socket: String,

    /// Local port of the license status API.
    pub license_port: u16,

    /// Text that marks a file as a certificate.
    pub certificate_marker: String,

    /// Process names that identify the listening service.
    pub process_patterns: Vec<String>,

    /// Path of the web console used for readiness checks.
    pub console_path: String,
}

impl Default for ProductProfile {
    fn default() -> Self {
        Self {
            display_name: "Vendor Server".to_string(),
            service_unit: "vendor-server".to_string(),
            package_manager: "dnf".to_string(),
            os_packages: [
                "net-snmp",
                "net-snmp-utils",
                "tar",
                "gzip",
                "unzip",
                "iproute",
                "hostname",
                "procps-ng",
            ]
            .map(String::from)
            .to_vec(),
            conflicting_package: Some("libstdc++.i686".to_string()),
            runtime: RuntimeSpec {
                package: "python39".to_string(),
                executable: "python3.9".to_string(),
                version: "3.9".to_string(),
            },
            libraries: [
                "requests==2.31.0",
                "urllib3==1.26.18",
                "pysnmp==4.4.12",
                "psutil==5.9.8",
            ]
            .map(String::from)
            .to_vec(),
            installer_name: "install.sh".to_string(),
            kernel_parameters: vec![
                KernelParameter::new("net.core.rmem_max", "26214400"),
                KernelParameter::new("net.core.wmem_max", "26214400"),
                KernelParameter::new("net.core.netdev_max_backlog", "5000"),
            ],
            monitoring_unit: "snmpd".to_string(),
            agentx_socket: "agentXSocket tcp:127.0.0.1:705".to_string(),
            license_port: 8080,
            certificate_marker: "-----BEGIN CERTIFICATE-----".to_string(),
            process_patterns: ["vendor-server", "vendor-web"].map(String::from).to_vec(),
            console_path: "/console/".to_string(),
        }
    }
}

impl ProductProfile {
    /// Load a profile from a YAML file, filling unspecified fields from the
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Self = serde_yaml::from_str(&text).map_err(|source| ProfileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let invalid = |reason: &str| {
            Err(ProfileError::Invalid {
                reason: reason.to_string(),
            })
        };

        if self.installer_name.trim().is_empty() || self.installer_name.contains('/') {
            return invalid("installer_name must be a bare file name");
        }
        if self.process_patterns.iter().all(|p| p.trim().is_empty()) {
            return invalid("process_patterns must name at least one process");
        }
        if !self.console_path.starts_with('/') {
            return invalid("console_path must start with '/'");
        }
        if self.certificate_marker.trim().is_empty() {
            return invalid("certificate_marker must not be empty");
        }
        if let Some(bad) = self.kernel_parameters.iter().find(|p| {
            p.key.trim().is_empty() || p.key.contains('=') || p.value.trim().is_empty()
        }) {
            return invalid(&format!("kernel parameter '{}' is malformed", bad.line()));
        }
        self.runtime.version_req()?;
        Ok(())
    }

    /// URL of the license status API.
    pub fn license_status_url(&self) -> String {
        format!("http://localhost:{}{}", self.license_port, LICENSE_STATUS_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_valid() {
        let profile = ProductProfile::default();
        assert!(profile.validate().is_ok());
        assert_eq!(profile.kernel_parameters.len(), 3);
        assert_eq!(
            profile.license_status_url(),
            "http://localhost:8080/api/license/status"
        );
    }

    #[test]
    fn test_kernel_parameter_line() {
        let param = KernelParameter::new("net.core.rmem_max", "26214400");
        assert_eq!(param.line(), "net.core.rmem_max=26214400");
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.yaml");
        std::fs::write(
            &path,
            "service_unit: acme\nlicense_port: 9443\nprocess_patterns: [acme-java]\n",
        )
        .unwrap();

        let profile = ProductProfile::load(&path).unwrap();
        assert_eq!(profile.service_unit, "acme");
        assert_eq!(profile.license_port, 9443);
        assert_eq!(profile.process_patterns, vec!["acme-java".to_string()]);
        assert_eq!(profile.installer_name, "install.sh");
        assert_eq!(profile.monitoring_unit, "snmpd");
    }

    #[test]
    fn test_load_rejects_unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.yaml");
        std::fs::write(&path, "servce_unit: typo\n").unwrap();

        assert!(matches!(
            ProductProfile::load(&path),
            Err(ProfileError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ProductProfile::load(Path::new("/nonexistent/profile.yaml"));
        assert!(matches!(result, Err(ProfileError::Read { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let profile = ProductProfile {
            console_path: "console".to_string(),
            ..Default::default()
        };
        assert!(matches!(profile.validate(), Err(ProfileError::Invalid { .. })));

        let profile = ProductProfile {
            installer_name: "bin/install.sh".to_string(),
            ..Default::default()
        };
        assert!(profile.validate().is_err());

        let profile = ProductProfile {
            process_patterns: vec![" ".to_string()],
            ..Default::default()
        };
        assert!(profile.validate().is_err());

        let mut profile = ProductProfile::default();
        profile.runtime.version = "three".to_string();
        assert!(profile.validate().is_err());
    }
}
