mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "mculink", version, about = "Talk to a microcontroller over a framed link")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true, env = "MCULINK_FORMAT")]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        global = true,
        env = "MCULINK_LOG_LEVEL"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "mculink",
            "send",
            "unix:/tmp/mcu.sock",
            "LED:on",
            "--timeout",
            "2s",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.endpoint, "unix:/tmp/mcu.sock");
        assert_eq!(args.command, "LED:on");
        assert_eq!(args.timeout, "2s");
    }

    #[test]
    fn send_requires_a_command() {
        let err = Cli::try_parse_from(["mculink", "send", "/tmp/mcu.sock"])
            .expect_err("missing command should fail");

        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_telemetry_with_global_flags() {
        let cli = Cli::try_parse_from([
            "mculink",
            "telemetry",
            "tcp:127.0.0.1:2000",
            "--duration",
            "500ms",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("telemetry args should parse");

        assert!(matches!(cli.command, Command::Telemetry(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.log_level, LogLevel::Debug));
    }

    #[test]
    fn parses_bench_defaults() {
        let cli = Cli::try_parse_from(["mculink", "bench", "unix:/tmp/mcu.sock"])
            .expect("bench args should parse");

        let Command::Bench(args) = cli.command else {
            panic!("expected bench");
        };
        assert_eq!(args.count, 20);
        assert_eq!(args.pause, "1s");
        assert_eq!(args.timeout, "10s");
    }

    #[test]
    fn parses_simulate_defaults() {
        let cli = Cli::try_parse_from(["mculink", "simulate", "/tmp/mcu.sock"])
            .expect("simulate args should parse");

        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.interval, "20ms");
        assert_eq!(args.reply, "ok");
    }
}
