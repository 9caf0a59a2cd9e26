//! The ordered stages of a deployment run.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// One step of the deployment pipeline.
///
/// Variants are declared in execution order; [`Stage::all()`] yields them
/// in that order.
///
/// # Example
///
/// ```rust
/// use vendor_deploy::Stage;
///
/// let order: Vec<_> = Stage::all().map(|s| s.label()).collect();
/// assert_eq!(order.first(), Some(&"preflight"));
/// assert_eq!(order.last(), Some(&"readiness"));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Host identity and privilege checks.
    Preflight,
    /// OS packages, runtime and libraries.
    Dependencies,
    /// Find the vendor archive in the working directory.
    LocateArchive,
    /// Unpack the archive and find the installer.
    ExtractArchive,
    /// Copy the installer into the isolated staging directory.
    StageInstaller,
    /// Execute the vendor installer.
    RunInstaller,
    /// Kernel network parameters.
    SystemTuning,
    /// SNMP agentx socket and daemon restart.
    Monitoring,
    /// License determination and resolution.
    License,
    /// Wait for the web console to answer.
    Readiness,
}

impl Stage {
    /// Short stable label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Dependencies => "dependencies",
            Self::LocateArchive => "locate-archive",
            Self::ExtractArchive => "extract-archive",
            Self::StageInstaller => "stage-installer",
            Self::RunInstaller => "run-installer",
            Self::SystemTuning => "system-tuning",
            Self::Monitoring => "monitoring",
            Self::License => "license",
            Self::Readiness => "readiness",
        }
    }

    /// Human-readable name for progress output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Preflight => "Validating host",
            Self::Dependencies => "Installing dependencies",
            Self::LocateArchive => "Locating vendor archive",
            Self::ExtractArchive => "Extracting vendor archive",
            Self::StageInstaller => "Staging vendor installer",
            Self::RunInstaller => "Running vendor installer",
            Self::SystemTuning => "Applying kernel parameters",
            Self::Monitoring => "Configuring SNMP monitoring",
            Self::License => "Resolving license",
            Self::Readiness => "Waiting for service",
        }
    }

    /// Iterator over all stages in execution order.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_order() {
        let all: Vec<_> = Stage::all().collect();
        assert_eq!(all.len(), 10);
        assert_eq!(all[0], Stage::Preflight);
        assert_eq!(all[2], Stage::LocateArchive);
        assert_eq!(all[5], Stage::RunInstaller);
        assert_eq!(all[9], Stage::Readiness);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_labels_are_unique() {
        use std::collections::HashSet;
        let labels: HashSet<_> = Stage::all().map(|s| s.label()).collect();
        assert_eq!(labels.len(), 10);
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&Stage::LocateArchive).unwrap();
        assert_eq!(json, "\"locate-archive\"");
        let stage: Stage = serde_json::from_str("\"run-installer\"").unwrap();
        assert_eq!(stage, Stage::RunInstaller);
    }
}
