use std::time::Duration;

use mculink_frame::FrameError;
use mculink_transport::TransportError;

/// Errors returned by [`crate::Session::send`].
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// No connection is active.
    #[error("not connected")]
    NotConnected,

    /// Writing the command to the transport failed.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] FrameError),

    /// No matching reply arrived in time.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// Another request with the same correlation id is still pending.
    #[error("correlation id {0} is already pending")]
    IdCollision(String),

    /// The connection went away while the request was outstanding.
    #[error("connection closed before a reply arrived")]
    ConnectionClosed,
}

/// Errors that can occur in session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A live connection already exists.
    #[error("already connected")]
    AlreadyConnected,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The reader thread could not be started.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(std::io::Error),

    /// A request failed.
    #[error(transparent)]
    Send(#[from] SendError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
