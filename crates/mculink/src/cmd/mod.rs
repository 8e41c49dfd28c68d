use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use mculink_transport::Endpoint;

use crate::exit::{transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod bench;
pub mod send;
pub mod simulate;
pub mod telemetry;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command and print the device's reply.
    Send(SendArgs),
    /// Stream state updates and print their rate.
    Telemetry(TelemetryArgs),
    /// Time batches of short and long commands.
    Bench(BenchArgs),
    /// Run a device simulator on a Unix socket.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Telemetry(args) => telemetry::run(args, format),
        Command::Bench(args) => bench::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Device endpoint (unix:PATH, tcp:HOST:PORT, or a socket path).
    pub endpoint: String,
    /// Command text; a newline is appended on the wire.
    pub command: String,
    /// Maximum time to wait for the reply (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s", env = "MCULINK_TIMEOUT")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct TelemetryArgs {
    /// Device endpoint (unix:PATH, tcp:HOST:PORT, or a socket path).
    pub endpoint: String,
    /// How long to stream before stopping (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub duration: String,
    /// Maximum time to wait for each start/stop reply.
    #[arg(long, default_value = "10s", env = "MCULINK_TIMEOUT")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Device endpoint (unix:PATH, tcp:HOST:PORT, or a socket path).
    pub endpoint: String,
    /// Commands sent per batch.
    #[arg(long, default_value_t = 20)]
    pub count: u32,
    /// Idle time between the short and the long batch.
    #[arg(long, default_value = "1s")]
    pub pause: String,
    /// Maximum time to wait for each reply.
    #[arg(long, default_value = "10s", env = "MCULINK_TIMEOUT")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Delay between state updates while streaming.
    #[arg(long, default_value = "20ms")]
    pub interval: String,
    /// Body of every reply.
    #[arg(long, default_value = "ok")]
    pub reply: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    Endpoint::parse(input).map_err(|err| transport_error("invalid endpoint", err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn install_ctrlc_handler<F>(on_interrupt: F) -> CliResult<Arc<AtomicBool>>
where
    F: Fn() + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
        on_interrupt();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}
