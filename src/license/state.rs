//! License state derivation.

use crate::http::HttpProbe;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Classification of the product's current licensing.
///
/// Always derived fresh from the certificate file and the status endpoint;
/// never cached between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseState {
    /// No certificate, or an empty one.
    Missing,
    /// A certificate file that is not a certificate, or rejected by the service.
    Invalid,
    /// A trial license.
    Trial,
    /// A license past its end date.
    Expired,
    /// A production license.
    Valid,
    /// The service could not be asked or gave an unrecognized answer.
    Unknown,
}

impl LicenseState {
    /// Whether a new license must be supplied.
    ///
    /// Only [`LicenseState::Valid`] and [`LicenseState::Trial`] need no action.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vendor_deploy::LicenseState;
    ///
    /// assert!(!LicenseState::Trial.needs_license());
    /// assert!(LicenseState::Unknown.needs_license());
    /// ```
    pub fn needs_license(&self) -> bool {
        !matches!(self, Self::Valid | Self::Trial)
    }
}

impl fmt::Display for LicenseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Missing => "missing",
            Self::Invalid => "invalid",
            Self::Trial => "trial",
            Self::Expired => "expired",
            Self::Valid => "valid",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Derive the license state from the certificate contents and the status
/// endpoint's answer.
///
/// `artifact` is `None` when the certificate file does not exist; `status`
/// is `None` when the endpoint was unreachable or answered with a non-2xx
/// status. The endpoint answer is only consulted once the certificate
/// carries `marker`.
///
/// # Example
///
/// ```rust
/// use vendor_deploy::{derive_state, LicenseState};
///
/// let marker = "-----BEGIN CERTIFICATE-----";
/// let cert = "-----BEGIN CERTIFICATE-----\nMIIB...\n";
/// assert_eq!(derive_state(None, marker, None), LicenseState::Missing);
/// assert_eq!(derive_state(Some("garbage"), marker, None), LicenseState::Invalid);
/// assert_eq!(derive_state(Some(cert), marker, Some("{\"status\":\"VALID\"}")), LicenseState::Valid);
/// assert_eq!(derive_state(Some(cert), marker, None), LicenseState::Unknown);
/// ```
pub fn derive_state(artifact: Option<&str>, marker: &str, status: Option<&str>) -> LicenseState {
    let Some(artifact) = artifact.filter(|text| !text.trim().is_empty()) else {
        return LicenseState::Missing;
    };
    if !artifact.contains(marker) {
        return LicenseState::Invalid;
    }
    let Some(body) = status else {
        return LicenseState::Unknown;
    };

    // "invalid" contains "valid", so the negative words are checked first.
    let body = body.to_ascii_lowercase();
    if body.contains("expired") {
        LicenseState::Expired
    } else if body.contains("trial") {
        LicenseState::Trial
    } else if body.contains("invalid") {
        LicenseState::Invalid
    } else if body.contains("valid") {
        LicenseState::Valid
    } else {
        LicenseState::Unknown
    }
}

/// Read the certificate and query the status endpoint, then derive the state.
pub async fn current_state(
    http: &dyn HttpProbe,
    certificate: &Path,
    marker: &str,
    status_url: &str,
) -> LicenseState {
    let artifact = match std::fs::read(certificate) {
        // Certificates are not guaranteed to be PEM text.
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            debug!(path = %certificate.display(), error = %e, "license certificate unreadable");
            return LicenseState::Invalid;
        }
    };
    let has_marker = artifact.as_deref().is_some_and(|text| text.contains(marker));

    let status = if has_marker {
        match http.get(status_url).await {
            Ok(response) if (200..300).contains(&response.status) => Some(response.body),
            Ok(response) => {
                debug!(status = response.status, "license endpoint returned an error status");
                None
            }
            Err(e) => {
                debug!(error = %e, "license endpoint unreachable");
                None
            }
        }
    } else {
        None
    };

    derive_state(artifact.as_deref(), marker, status.as_deref())
}
