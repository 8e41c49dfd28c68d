//! Host-side link to a microcontroller over a newline-framed byte stream.
//!
//! The host sends `<id>:<command>\n`; the device answers `R:<id>:<body>\n`
//! and may stream `S:<body>\n` state updates at any time. mculink matches
//! replies to requests by id and tracks how fast state updates arrive.
//!
//! # Crate Structure
//!
//! - [`transport`]: Duplex byte streams (UDS, TCP serial bridges)
//! - [`frame`]: Newline framing and message decoding
//! - [`session`]: Request/reply correlation and telemetry (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use mculink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mculink_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use mculink_session::*;
}
