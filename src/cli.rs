//! Command-line arguments.

use crate::{AddressPolicy, DeployOptions, DeployPaths, FileLicenseSource, LicenseSource, TerminalLicenseSource};
use clap::builder::{styling::AnsiColor, Styles};
use clap::Parser;
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Deploy the vendor server onto this host.
///
/// Runs every stage in order and stops at the first failure. Re-running
/// is safe: each stage is idempotent.
#[derive(Parser, Debug)]
#[command(
    name = "vendor-deploy",
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  sudo vendor-deploy --workdir /root/media\n    \
                  sudo vendor-deploy --license-file /root/license.cert --host 10.0.0.5\n    \
                  sudo vendor-deploy --exclude-subnet 127.0.0.0/8 --exclude-subnet 172.17.0.0/16"
)]
pub struct Cli {
    /// Directory containing the vendor archive
    #[arg(long, short = 'w', env = "VENDOR_DEPLOY_WORKDIR", default_value = ".")]
    pub workdir: PathBuf,

    /// YAML product profile overriding the built-in defaults
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Run log location
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Install this license file instead of prompting
    #[arg(long)]
    pub license_file: Option<PathBuf>,

    /// Advertise this address instead of discovering one
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Never advertise addresses in this network (repeatable, replaces the defaults)
    #[arg(long = "exclude-subnet", value_name = "CIDR")]
    pub exclude_subnets: Vec<IpNetwork>,

    /// Kill any single external command after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub command_timeout: Option<u64>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Options for the run described by these arguments.
    pub fn options(&self) -> DeployOptions {
        let mut paths = DeployPaths::default();
        if let Some(log_file) = &self.log_file {
            paths.log_file = log_file.clone();
        }

        let mut address_policy = AddressPolicy {
            explicit_host: self.host,
            ..AddressPolicy::default()
        };
        if !self.exclude_subnets.is_empty() {
            address_policy.excluded = self.exclude_subnets.clone();
        }

        DeployOptions {
            workdir: self.workdir.clone(),
            paths,
            address_policy,
            command_timeout: self.command_timeout.map(Duration::from_secs),
            ..DeployOptions::default()
        }
    }

    /// Where a new license comes from.
    pub fn license_source(&self) -> Arc<dyn LicenseSource> {
        match &self.license_file {
            Some(path) => Arc::new(FileLicenseSource::new(path)),
            None => Arc::new(TerminalLicenseSource),
        }
    }
}
