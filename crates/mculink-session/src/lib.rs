//! Request/reply sessions with a microcontroller.
//!
//! This is the "just works" layer. Connect a [`Session`] to a duplex stream,
//! call [`Session::send`] from any number of threads, and read the telemetry
//! stream's latest value and update rate while replies keep flowing.

pub mod config;
pub mod connection;
pub mod error;
pub mod pending;
pub mod reader_loop;
pub mod session;
pub mod telemetry;

pub use config::{
    SessionConfig, BEGIN_TELEMETRY_COMMAND, DEFAULT_JOIN_TIMEOUT, DEFAULT_RATE_EVERY,
    DEFAULT_RESPONSE_TIMEOUT, STOP_TELEMETRY_COMMAND,
};
pub use connection::Connection;
pub use error::{Result, SendError, SessionError};
pub use mculink_frame::Reply;
pub use pending::{PendingHandle, PendingTable, RegisterError};
pub use reader_loop::ExitReason;
pub use session::{Session, SessionBuilder};
pub use telemetry::{Clock, RateObserver, SystemClock, TelemetrySnapshot, TelemetryTracker};
