//! Progress reporting for deployment runs.
//!
//! The pipeline reports each discrete event through a caller-supplied
//! callback taking a [`DeployProgress`]. The binary prints a line for stage
//! starts, retries and warnings. Tests use it to observe stage order.

use crate::{ServiceEndpoint, Stage};
use std::time::Duration;

/// Events emitted while a deployment runs.
///
/// # Example
///
/// ```rust
/// use vendor_deploy::{DeployProgress, Stage};
///
/// fn on_progress(progress: DeployProgress) {
///     match &progress {
///         DeployProgress::StageStarted { stage } => println!("{}...", stage.display_name()),
///         DeployProgress::Attempt { stage, attempt, max_attempts } => {
///             println!("{}: attempt {attempt}/{max_attempts}", stage.label())
///         }
///         DeployProgress::Warning { message, .. } => println!("warning: {message}"),
///         other => println!("{}", other.description()),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployProgress {
    /// A stage has started.
    StageStarted {
        /// The stage.
        stage: Stage,
    },

    /// A stage finished and handed control to the next.
    StageCompleted {
        /// The stage.
        stage: Stage,
        /// How long it took.
        elapsed: Duration,
    },

    /// A bounded retry loop is making another probe.
    Attempt {
        /// The stage running the loop.
        stage: Stage,
        /// 1-based attempt number.
        attempt: u32,
        /// Budgeted attempts.
        max_attempts: u32,
    },

    /// A non-fatal problem; the run continues.
    Warning {
        /// The stage reporting it.
        stage: Stage,
        /// What happened.
        message: String,
    },

    /// Every stage succeeded.
    Completed {
        /// Where the service answered.
        endpoint: ServiceEndpoint,
    },
}

impl DeployProgress {
    /// Short description of the event.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vendor_deploy::{DeployProgress, Stage};
    ///
    /// let progress = DeployProgress::StageStarted { stage: Stage::Preflight };
    /// assert_eq!(progress.description(), "Stage started");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::StageStarted { .. } => "Stage started",
            Self::StageCompleted { .. } => "Stage completed",
            Self::Attempt { .. } => "Retrying",
            Self::Warning { .. } => "Warning",
            Self::Completed { .. } => "Deployment complete",
        }
    }

    /// The stage this event belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageStarted { stage }
            | Self::StageCompleted { stage, .. }
            | Self::Attempt { stage, .. }
            | Self::Warning { stage, .. } => Some(*stage),
            Self::Completed { .. } => None,
        }
    }

    /// Check if this event marks the end of a successful run.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
