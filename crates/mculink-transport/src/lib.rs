//! Duplex byte-stream transport for microcontroller links.
//!
//! The session layer only needs something it can read from on one thread and
//! write to on another, and that it can shut down to unblock a pending read.
//! That contract is the [`Duplex`] trait. Concrete links are provided for:
//! - Unix domain sockets (device simulators, `socat` serial bridges)
//! - TCP (ser2net-style serial servers)
//!
//! Physical link setup (pairing, opening a tty) stays with the caller.

pub mod endpoint;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use traits::{Duplex, LinkStream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
