use std::thread;
use std::time::Instant;

use mculink_session::{Session, SessionConfig};
use tracing::info;

use crate::cmd::{parse_duration, parse_endpoint, BenchArgs};
use crate::exit::{send_error, session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_bench, BenchBatch, OutputFormat};

/// Three-byte command for the latency batch.
pub const SHORT_PAYLOAD: &str = "abc";

/// Fifty-byte command for the throughput batch.
pub const LONG_PAYLOAD: &str = "Nabcdefghijklmnopqrstuvwxzy01234567890123456789012";

pub fn run(args: BenchArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == 0 {
        return Err(CliError::new(USAGE, "count must be greater than zero"));
    }
    let timeout = parse_duration(&args.timeout)?;
    let pause = parse_duration(&args.pause)?;
    let endpoint = parse_endpoint(&args.endpoint)?;
    let endpoint_name = endpoint.to_string();

    let session = Session::new(SessionConfig {
        response_timeout: timeout,
        ..SessionConfig::default()
    });
    session
        .connect_endpoint(&endpoint)
        .map_err(|err| session_error("connect failed", err))?;

    let short = run_batch(&session, SHORT_PAYLOAD, args.count);
    let batches = short.and_then(|short| {
        print_bench(&short, &endpoint_name, format);
        // Let the device drain before the second batch.
        thread::sleep(pause);
        run_batch(&session, LONG_PAYLOAD, args.count)
    });
    session.disconnect();

    let long = batches?;
    print_bench(&long, &endpoint_name, format);
    Ok(SUCCESS)
}

/// Send `payload` `count` times back to back, each waiting for its reply.
fn run_batch(session: &Session, payload: &str, count: u32) -> CliResult<BenchBatch> {
    let started = Instant::now();
    for _ in 0..count {
        session
            .send(payload)
            .map_err(|err| send_error("benchmark send failed", err))?;
    }
    let batch = BenchBatch::new(payload.len(), count, started.elapsed());
    info!(
        payload_bytes = batch.payload_bytes,
        count,
        total_ms = batch.total.as_millis() as u64,
        "benchmark batch finished"
    );
    Ok(batch)
}
