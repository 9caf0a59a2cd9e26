//! License detection and installation.
//!
//! The state is always derived fresh from the certificate on disk and the
//! product's status endpoint. When it is not usable, the operator is asked
//! for a new license through a [`LicenseSource`], the certificate is
//! installed, the service restarted, and the state polled until it reads
//! valid or the budget runs out. None of this can abort a run.

mod resolver;
mod source;
mod state;

pub use resolver::{LicenseOutcome, LicenseResolver};
pub use source::{FileLicenseSource, LicenseSource, LicenseSupply, TerminalLicenseSource};
pub use state::{current_state, derive_state, LicenseState};
