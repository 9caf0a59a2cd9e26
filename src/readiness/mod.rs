//! Waiting for the installed service to come up.
//!
//! Each poll scans the listening-socket table for a service process,
//! resolves the host's advertised address, and requests the web console.
//! The run fails if the console never answers 200 within the budget.

mod address;
mod poller;
mod sockets;

pub use address::{default_exclusions, AddressPolicy};
pub use poller::{NotReady, ReadinessPoller};
pub use sockets::{find_service_port, ListeningSocket};
