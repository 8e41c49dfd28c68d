use std::time::Duration;

use mculink_frame::FrameConfig;

/// Command that asks the device to start streaming state updates.
pub const BEGIN_TELEMETRY_COMMAND: &str = "START_STATE";

/// Command that asks the device to stop streaming state updates.
pub const STOP_TELEMETRY_COMMAND: &str = "STOP_STATE";

/// How long `send` waits for a reply.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long closing a connection waits for the reader thread.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A rate sample is taken every this many state updates.
pub const DEFAULT_RATE_EVERY: u64 = 10;

/// Session behavior configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum time `send` blocks waiting for the matching reply.
    pub response_timeout: Duration,
    /// Maximum time `disconnect` waits for the reader thread to exit.
    pub join_timeout: Duration,
    /// Longest a single transport write may block; `None` uses `response_timeout`.
    pub write_timeout: Option<Duration>,
    /// Frame assembly limits for the reader thread.
    pub frame: FrameConfig,
    /// Command sent by `begin_telemetry`.
    pub begin_command: String,
    /// Command sent by `stop_telemetry`.
    pub stop_command: String,
    /// Number of state updates between rate samples.
    pub rate_every: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            write_timeout: None,
            frame: FrameConfig::default(),
            begin_command: BEGIN_TELEMETRY_COMMAND.to_string(),
            stop_command: STOP_TELEMETRY_COMMAND.to_string(),
            rate_every: DEFAULT_RATE_EVERY,
        }
    }
}
