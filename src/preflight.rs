//! Preflight validation.
//!
//! Confirms the host is a certified distribution at a supported version
//! and that the process runs as root. Nothing is mutated and nothing is
//! retried: a version mismatch cannot be fixed by waiting.

use crate::DeployError;
use regex::Regex;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use strum::IntoEnumIterator;
use tracing::info;

/// Certified distribution families.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Red Hat Enterprise Linux, `ID=rhel`.
    Rhel,
    /// AlmaLinux, `ID=almalinux`.
    AlmaLinux,
    /// Rocky Linux, `ID=rocky`.
    Rocky,
}

impl OsFamily {
    /// The `ID` value in `/etc/os-release`.
    pub fn os_release_id(&self) -> &'static str {
        match self {
            Self::Rhel => "rhel",
            Self::AlmaLinux => "almalinux",
            Self::Rocky => "rocky",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Rhel => "Red Hat Enterprise Linux",
            Self::AlmaLinux => "AlmaLinux",
            Self::Rocky => "Rocky Linux",
        }
    }

    /// Look up a family by its `/etc/os-release` `ID`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vendor_deploy::OsFamily;
    ///
    /// assert_eq!(OsFamily::from_os_release_id("rocky"), Some(OsFamily::Rocky));
    /// assert_eq!(OsFamily::from_os_release_id("ubuntu"), None);
    /// ```
    pub fn from_os_release_id(id: &str) -> Option<Self> {
        Self::all().find(|family| family.os_release_id() == id)
    }

    /// Lowest certified minor release of the 8.x series.
    pub fn minimum_8x_minor(&self) -> u64 {
        match self {
            Self::Rhel => 2,
            Self::AlmaLinux => 3,
            Self::Rocky => 4,
        }
    }

    /// Certified version ranges, as semver requirements on `major.minor.0`.
    pub fn supported_versions(&self) -> [String; 2] {
        [
            format!(">=8.{}.0, <9.0.0", self.minimum_8x_minor()),
            "^9".to_string(),
        ]
    }

    /// Whether `version` is certified for this family.
    pub fn supports(&self, version: &Version) -> bool {
        self.supported_versions()
            .iter()
            .any(|req| VersionReq::parse(req).is_ok_and(|req| req.matches(version)))
    }

    /// Iterator over all certified families.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

/// Parsed host identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProfile {
    /// The `ID` field as found.
    pub id: String,

    /// The certified family, if `id` names one.
    pub family: Option<OsFamily>,

    /// `major.minor` as a semver version with patch 0.
    pub version: Version,
}

impl fmt::Display for HostProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.id, self.version.major, self.version.minor)
    }
}

impl HostProfile {
    /// Parse the contents of an `/etc/os-release` file.
    ///
    /// Returns `None` if `ID` or a numeric `VERSION_ID` is missing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vendor_deploy::{HostProfile, OsFamily};
    ///
    /// let host = HostProfile::parse("ID=\"rhel\"\nVERSION_ID=\"8.6\"\n").unwrap();
    /// assert_eq!(host.family, Some(OsFamily::Rhel));
    /// assert_eq!(host.version.minor, 6);
    /// ```
    pub fn parse(os_release: &str) -> Option<Self> {
        let mut id = None;
        let mut version_id = None;
        for line in os_release.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            match key.trim() {
                "ID" => id = Some(value.to_ascii_lowercase()),
                "VERSION_ID" => version_id = Some(value.to_string()),
                _ => {}
            }
        }

        let id = id?;
        let caps = version_regex().captures(version_id.as_deref()?)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);

        Some(Self {
            family: OsFamily::from_os_release_id(&id),
            id,
            version: Version::new(major, minor, 0),
        })
    }

    /// Whether the host is a certified family at a supported version.
    pub fn is_supported(&self) -> bool {
        self.family
            .map(|family| family.supports(&self.version))
            .unwrap_or(false)
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)(?:\.(\d+))?").expect("Invalid version regex"))
}

/// Effective UID of this process.
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

/// Reject hosts that are not certified.
pub fn validate_host(host: &HostProfile) -> Result<(), DeployError> {
    if host.is_supported() {
        return Ok(());
    }

    let fix = match host.family {
        Some(family) => format!(
            "Upgrade {} to 8.{} or later, or any 9.x release",
            family.display_name(),
            family.minimum_8x_minor()
        ),
        None => "Use RHEL 8.2+, AlmaLinux 8.3+ or Rocky Linux 8.4+ (or any 9.x)".to_string(),
    };
    Err(DeployError::UnsupportedOperatingSystem {
        found: host.to_string(),
        fix,
    })
}

/// Reject non-root processes.
pub fn validate_privilege(euid: u32) -> Result<(), DeployError> {
    if euid == 0 {
        return Ok(());
    }
    Err(DeployError::InsufficientPrivilege {
        euid,
        fix: "Re-run as root, e.g. with sudo".to_string(),
    })
}

/// Run the preflight stage: host identity first, then privilege.
pub fn run(os_release: &Path, euid: u32) -> Result<HostProfile, DeployError> {
    let text = match std::fs::read_to_string(os_release) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(DeployError::io(os_release, e)),
    };

    let host = HostProfile::parse(&text).ok_or_else(|| DeployError::UnsupportedOperatingSystem {
        found: format!("unidentified host ({})", os_release.display()),
        fix: "Run on a certified distribution with a readable /etc/os-release".to_string(),
    })?;

    validate_host(&host)?;
    validate_privilege(euid)?;

    info!(host = %host, euid, "preflight passed");
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(id: &str, major: u64, minor: u64) -> HostProfile {
        HostProfile {
            id: id.to_string(),
            family: OsFamily::from_os_release_id(id),
            version: Version::new(major, minor, 0),
        }
    }

    #[test]
    fn test_accepts_every_supported_pair() {
        let minimums = [("rhel", 2), ("almalinux", 3), ("rocky", 4)];
        for (id, min_minor) in minimums {
            for minor in min_minor..=10 {
                assert!(host(id, 8, minor).is_supported(), "{id} 8.{minor}");
            }
            for minor in 0..=6 {
                assert!(host(id, 9, minor).is_supported(), "{id} 9.{minor}");
            }
        }
    }

    #[test]
    fn test_rejects_versions_below_minimum() {
        let minimums = [("rhel", 2), ("almalinux", 3), ("rocky", 4)];
        for (id, min_minor) in minimums {
            for minor in 0..min_minor {
                assert!(!host(id, 8, minor).is_supported(), "{id} 8.{minor}");
            }
            assert!(!host(id, 7, 9).is_supported(), "{id} 7.9");
            assert!(!host(id, 10, 0).is_supported(), "{id} 10.0");
        }
    }

    #[test]
    fn test_rejects_unknown_family() {
        let ubuntu = host("ubuntu", 22, 4);
        assert!(ubuntu.family.is_none());
        let err = validate_host(&ubuntu).unwrap_err();
        assert!(matches!(err, DeployError::UnsupportedOperatingSystem { .. }));
        assert!(err.to_string().contains("ubuntu 22.4"));
    }

    #[test]
    fn test_parse_os_release_variants() {
        let text = "NAME=\"Rocky Linux\"\nID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\nVERSION_ID=\"9.3\"\n";
        let parsed = HostProfile::parse(text).unwrap();
        assert_eq!(parsed.family, Some(OsFamily::Rocky));
        assert_eq!(parsed.version, Version::new(9, 3, 0));

        let parsed = HostProfile::parse("ID=almalinux\nVERSION_ID=9\n").unwrap();
        assert_eq!(parsed.version, Version::new(9, 0, 0));

        assert!(HostProfile::parse("NAME=Linux\n").is_none());
        assert!(HostProfile::parse("ID=rhel\nVERSION_ID=rolling\n").is_none());
    }

    #[test]
    fn test_privilege() {
        assert!(validate_privilege(0).is_ok());
        let err = validate_privilege(1000).unwrap_err();
        assert!(matches!(err, DeployError::InsufficientPrivilege { euid: 1000, .. }));
    }

    #[test]
    fn test_run_checks_os_before_privilege() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, "ID=rhel\nVERSION_ID=\"8.1\"\n").unwrap();

        let err = run(&path, 1000).unwrap_err();
        assert!(matches!(err, DeployError::UnsupportedOperatingSystem { .. }));
    }

    #[test]
    fn test_run_accepts_supported_root_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, "ID=\"rhel\"\nVERSION_ID=\"8.2\"\n").unwrap();

        let parsed = run(&path, 0).unwrap();
        assert_eq!(parsed.to_string(), "rhel 8.2");
    }

    #[test]
    fn test_run_missing_identity_file() {
        let err = run(Path::new("/nonexistent/os-release"), 0).unwrap_err();
        assert!(matches!(err, DeployError::UnsupportedOperatingSystem { .. }));
    }
}
