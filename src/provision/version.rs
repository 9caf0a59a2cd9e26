//! Version output parsing with regex extraction.

use regex::Regex;
use semver::Version;
use std::sync::OnceLock;

/// Parse a semantic version from CLI output.
///
/// Extracts the first `major.minor.patch` triple from arbitrary text:
///
/// - `Python 3.9.18` -> 3.9.18
/// - `pip 23.0.1 from /opt/venv/lib/python3.9/site-packages/pip` -> 23.0.1
///
/// Returns `None` when no triple is present.
pub(crate) fn parse_version(output: &str) -> Option<Version> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("Invalid regex pattern"));

    let caps = re.captures(output)?;
    Version::parse(caps.get(0)?.as_str()).ok()
}
