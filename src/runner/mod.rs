//! Subprocess execution.
//!
//! Every external tool the pipeline drives (package manager, vendor
//! installer, service manager, `sysctl`, `ss`) is reached through the
//! [`ProcessRunner`] trait. Callers only look at the structured
//! [`CommandOutput`]; the tools' internals are never inspected.

mod command;
mod path_finder;
mod system;

pub use command::{CommandOutput, StructuredCommand};
pub use system::SystemRunner;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure to run a subprocess at all.
///
/// A process that starts and exits non-zero is not an error at this level;
/// it is reported through [`CommandOutput::exit_code`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// The program could not be found on `PATH` or in the fallback locations.
    #[error("program not found: {program}")]
    ProgramNotFound {
        /// The program name that was looked up.
        program: String,
    },

    /// The program was found but could not be started or read.
    #[error("failed to run {program}: {source}")]
    Io {
        /// The program being run.
        program: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The program did not finish within the configured timeout.
    #[error("{program} timed out after {duration:?}")]
    Timeout {
        /// The program being run.
        program: String,
        /// How long it was allowed to run.
        duration: Duration,
    },
}

/// Runs external programs to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` and wait for it to exit.
    async fn run(&self, command: &StructuredCommand) -> Result<CommandOutput, RunnerError>;
}
