//! Newline-delimited text framing for microcontroller links.
//!
//! Every frame on the wire is `<type>:<rest>` followed by a single `\n`:
//! - `R:<correlation id>:<body>`: reply to a command sent by the host
//! - `S:<body>`: unsolicited state update (telemetry)
//!
//! Commands sent to the device are `<correlation id>:<command>\n`.
//! Bodies may contain `:`; only the fixed-position fields are split off.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_command, FrameAssembler, FrameConfig, Frames, DEFAULT_MAX_FRAME_LEN,
    DEFAULT_READ_CHUNK_SIZE, SEPARATOR, TERMINATOR,
};
pub use error::{DecodeError, FrameError, Result};
pub use message::{decode, Message, Reply, REPLY_TAG, STATE_TAG};
pub use reader::FrameReader;
pub use writer::CommandWriter;
