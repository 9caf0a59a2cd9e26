//! Where a new license comes from.

use async_trait::async_trait;
use inquire::validator::ValueRequiredValidator;
use inquire::{Select, Text};
use std::io::Read;
use std::path::PathBuf;

/// A license handed over by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseSupply {
    /// A file to copy verbatim to the certificate location.
    Path(PathBuf),
    /// Certificate text to write verbatim.
    Content(String),
}

impl LicenseSupply {
    /// Whether there is anything to install.
    ///
    /// This is the only validation applied before writing the certificate.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(path) => path.as_os_str().is_empty(),
            Self::Content(text) => text.trim().is_empty(),
        }
    }
}

/// Asks for a new license.
#[async_trait]
pub trait LicenseSource: Send + Sync {
    /// Obtain a license path or license content.
    async fn request_license(&self) -> std::io::Result<LicenseSupply>;
}

/// Always answers with a fixed file, for unattended runs.
#[derive(Debug, Clone)]
pub struct FileLicenseSource {
    path: PathBuf,
}

impl FileLicenseSource {
    /// Supply `path` whenever a license is requested.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LicenseSource for FileLicenseSource {
    async fn request_license(&self) -> std::io::Result<LicenseSupply> {
        Ok(LicenseSupply::Path(self.path.clone()))
    }
}

const FROM_FILE: &str = "Path to a license file";
const PASTE: &str = "Paste the license text";

/// Prompts the operator on the terminal.
///
/// Pasted content is read from stdin until end of input (Ctrl-D), so blank
/// lines inside the certificate are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalLicenseSource;

#[async_trait]
impl LicenseSource for TerminalLicenseSource {
    async fn request_license(&self) -> std::io::Result<LicenseSupply> {
        tokio::task::spawn_blocking(prompt)
            .await
            .map_err(std::io::Error::other)?
    }
}

fn prompt() -> std::io::Result<LicenseSupply> {
    let choice = Select::new(
        "No valid license is installed. How do you want to provide one?",
        vec![FROM_FILE, PASTE],
    )
    .prompt()
    .map_err(std::io::Error::other)?;

    if choice == FROM_FILE {
        let path = Text::new("License file path:")
            .with_validator(ValueRequiredValidator::new("A path is required"))
            .prompt()
            .map_err(std::io::Error::other)?;
        return Ok(LicenseSupply::Path(PathBuf::from(path.trim())));
    }

    println!("Paste the license, then press Ctrl-D on an empty line:");
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    Ok(LicenseSupply::Content(content))
}
