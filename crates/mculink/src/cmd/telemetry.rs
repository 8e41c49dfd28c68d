use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use mculink_session::{Session, SessionConfig};

use crate::cmd::{install_ctrlc_handler, parse_duration, parse_endpoint, TelemetryArgs};
use crate::exit::{send_error, session_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_telemetry, OutputFormat, TelemetryEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: TelemetryArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    let timeout = parse_duration(&args.timeout)?;
    let endpoint = parse_endpoint(&args.endpoint)?;
    let endpoint_name = endpoint.to_string();

    // Rates arrive on the reader thread; printing happens here.
    let (rate_tx, rate_rx) = mpsc::channel::<u32>();
    let session = Session::builder()
        .config(SessionConfig {
            response_timeout: timeout,
            write_timeout: Some(timeout),
            ..SessionConfig::default()
        })
        .observer(move |fps: u32| {
            let _ = rate_tx.send(fps);
        })
        .build();

    session
        .connect_endpoint(&endpoint)
        .map_err(|err| session_error("connect failed", err))?;
    let running = install_ctrlc_handler(|| {})?;

    let started = Instant::now();
    session
        .begin_telemetry()
        .map_err(|err| send_error("begin telemetry failed", err))?;
    let start_took = started.elapsed();
    tracing::info!(
        endpoint = %endpoint_name,
        ?duration,
        start_ms = start_took.as_millis() as u64,
        "streaming state updates"
    );
    print_telemetry(
        TelemetryEvent::Started(start_took),
        &session.telemetry(),
        &endpoint_name,
        format,
    );

    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) && session.is_connected() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match rate_rx.recv_timeout(remaining.min(POLL_INTERVAL)) {
            Ok(fps) => print_telemetry(
                TelemetryEvent::Sample(fps),
                &session.telemetry(),
                &endpoint_name,
                format,
            ),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if !session.is_connected() {
        return Err(CliError::new(
            TRANSPORT_ERROR,
            "device disconnected while streaming",
        ));
    }

    let stopping = Instant::now();
    let stopped = session.stop_telemetry();
    print_telemetry(
        TelemetryEvent::Summary(stopping.elapsed()),
        &session.telemetry(),
        &endpoint_name,
        format,
    );
    session.disconnect();
    stopped.map_err(|err| send_error("stop telemetry failed", err))?;

    Ok(SUCCESS)
}
