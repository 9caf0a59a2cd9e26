//! # vendor-deploy
//!
//! Staged, idempotent deployment of the vendor server product onto a
//! certified Linux host.
//!
//! A run executes ten [`Stage`]s strictly in order: host validation,
//! dependency provisioning, archive location and extraction, installer
//! staging and execution, kernel tuning, SNMP monitoring, license
//! resolution and readiness polling. Any stage can abort the run except
//! license resolution, which at worst leaves a warning. Re-running after a
//! failure starts from the first stage and relies on every stage being safe
//! to repeat.
//!
//! ## Features
//!
//! - [`Deployer`] drives the stages and reports [`DeployProgress`]
//! - [`ProcessRunner`], [`HttpProbe`] and [`LicenseSource`] are the seams to
//!   the outside world, with fakes in `testing` (enabled by the `testing`
//!   feature)
//! - [`retry_until`] is the bounded loop behind license and readiness polling
//! - [`ProductProfile`] holds product constants, loadable from YAML
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vendor_deploy::{
//!     init_logging, Deployer, DeployOptions, ProductProfile, ReqwestProbe, SystemRunner,
//!     TerminalLicenseSource,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let options = DeployOptions::default();
//!     let _log = init_logging(&options.paths.log_file, false).unwrap();
//!     let http = ReqwestProbe::new(options.http_timeout).unwrap();
//!
//!     let deployer = Deployer::new(
//!         options,
//!         ProductProfile::default(),
//!         Arc::new(SystemRunner::new()),
//!         Arc::new(http),
//!         Arc::new(TerminalLicenseSource),
//!     );
//!     match deployer.run(|progress| println!("{}", progress.description())).await {
//!         Ok(summary) => println!("Console: {}", summary.url),
//!         Err(failure) => eprintln!("{failure}: {}", failure.error.fix_suggestion()),
//!     }
//! }
//! ```

pub mod cli;
mod context;
mod errors;
pub mod http;
pub mod license;
mod logging;
pub mod monitoring;
mod options;
mod pipeline;
pub mod preflight;
mod profile;
mod progress;
pub mod provision;
pub mod readiness;
pub mod report;
mod retry;
pub mod runner;
mod stage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tuning;
pub mod vendor;

pub use context::{InstallationContext, ServiceEndpoint};
pub use errors::DeployError;
pub use http::{HttpProbe, HttpResponse, ProbeError, ReqwestProbe};
pub use license::{
    derive_state, FileLicenseSource, LicenseOutcome, LicenseSource, LicenseState, LicenseSupply,
    TerminalLicenseSource,
};
pub use logging::{init_logging, LogGuard};
pub use options::{DeployOptions, DeployPaths, RetryBudget};
pub use pipeline::{Deployer, PipelineFailure, RunSummary, StageOutcome};
pub use preflight::{HostProfile, OsFamily};
pub use profile::{KernelParameter, ProductProfile, ProfileError, RuntimeSpec, LICENSE_STATUS_PATH};
pub use progress::DeployProgress;
pub use readiness::AddressPolicy;
pub use retry::{retry_until, RetryExhausted, Settled};
pub use runner::{CommandOutput, ProcessRunner, RunnerError, StructuredCommand, SystemRunner};
pub use stage::Stage;
pub use vendor::ArchiveFormat;
