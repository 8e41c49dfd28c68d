use std::time::Instant;

use mculink_session::{Session, SessionConfig};

use crate::cmd::{parse_duration, parse_endpoint, SendArgs};
use crate::exit::{send_error, session_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let endpoint = parse_endpoint(&args.endpoint)?;

    let session = Session::new(SessionConfig {
        response_timeout: timeout,
        write_timeout: Some(timeout),
        ..SessionConfig::default()
    });
    session
        .connect_endpoint(&endpoint)
        .map_err(|err| session_error("connect failed", err))?;

    let started = Instant::now();
    let result = session.send(&args.command);
    let elapsed = started.elapsed();
    session.disconnect();

    let reply = result.map_err(|err| send_error("send failed", err))?;
    print_reply(&reply, &endpoint.to_string(), elapsed, format);

    Ok(SUCCESS)
}
