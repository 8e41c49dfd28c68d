/// Errors that can occur while assembling, reading, or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame grew past the configured maximum before its terminator arrived.
    #[error("frame too long ({len} bytes, max {max})")]
    FrameTooLong { len: usize, max: usize },

    /// An outbound command contains the terminator somewhere other than its end.
    #[error("command contains an embedded line terminator")]
    EmbeddedTerminator,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached end-of-file.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors produced when a frame cannot be turned into a [`crate::Message`].
///
/// These are always recovered locally: the offending frame is logged and
/// dropped, the stream carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame was empty (two terminators in a row).
    #[error("empty frame")]
    Empty,

    /// The type tag is not `R` or `S`, or the frame has fewer than two fields.
    #[error("unrecognized message type '{tag}'")]
    UnrecognizedType { tag: String },

    /// The frame is not valid UTF-8 text.
    #[error("frame is not valid utf-8")]
    InvalidUtf8,
}
