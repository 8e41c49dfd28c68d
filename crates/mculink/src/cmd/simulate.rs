use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use mculink_frame::{FrameError, FrameReader, REPLY_TAG, SEPARATOR, STATE_TAG};
use mculink_session::{BEGIN_TELEMETRY_COMMAND, STOP_TELEMETRY_COMMAND};
use mculink_transport::{Duplex, LinkStream, UnixDomainSocket};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, SimulateArgs};
use crate::exit::{frame_error, io_error, transport_error, CliResult, SUCCESS};

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    // Accept blocks; a throwaway connection wakes it so the loop sees the flag.
    let wake_path = args.path.clone();
    let running = install_ctrlc_handler(move || {
        let _ = UnixDomainSocket::connect(&wake_path);
    })?;

    info!(path = %args.path.display(), "device simulator ready");

    while running.load(Ordering::SeqCst) {
        let stream = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match serve(stream, &args.reply, interval) {
            Ok(()) => debug!("host disconnected"),
            Err(err) => warn!(error = %err, "host session ended with error"),
        }
    }

    info!(path = %listener.path().display(), "device simulator stopped");
    Ok(SUCCESS)
}

fn serve(stream: LinkStream, reply: &str, interval: Duration) -> CliResult<()> {
    let write_half = Duplex::try_clone(&stream)
        .map_err(|err| transport_error("stream clone failed", err))?;
    let writer = Arc::new(Mutex::new(write_half));
    let streaming = Arc::new(AtomicBool::new(false));
    let done = Arc::new(AtomicBool::new(false));

    let streamer = {
        let writer = Arc::clone(&writer);
        let streaming = Arc::clone(&streaming);
        let done = Arc::clone(&done);
        thread::Builder::new()
            .name("sim-streamer".to_string())
            .spawn(move || stream_state(&writer, &streaming, &done, interval))
            .map_err(|err| io_error("streamer spawn failed", err))?
    };

    let result = answer_commands(stream, reply, &writer, &streaming);

    done.store(true, Ordering::SeqCst);
    let _ = streamer.join();
    result
}

fn answer_commands(
    stream: LinkStream,
    reply: &str,
    writer: &Mutex<LinkStream>,
    streaming: &AtomicBool,
) -> CliResult<()> {
    let mut reader = FrameReader::new(stream);
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return Ok(()),
            Err(FrameError::FrameTooLong { len, max }) => {
                warn!(len, max, "dropping oversized command");
                continue;
            }
            Err(err) => return Err(frame_error("read failed", err)),
        };

        let text = String::from_utf8_lossy(&frame);
        let Some((id, command)) = text.split_once(SEPARATOR as char) else {
            warn!(frame = %text, "dropping command without correlation id");
            continue;
        };
        info!(correlation_id = id, command, "command received");

        let line = format!("{REPLY_TAG}:{id}:{reply}\n");
        match command {
            BEGIN_TELEMETRY_COMMAND => {
                write_line(writer, &line)?;
                streaming.store(true, Ordering::SeqCst);
            }
            STOP_TELEMETRY_COMMAND => {
                streaming.store(false, Ordering::SeqCst);
                write_line(writer, &line)?;
            }
            _ => write_line(writer, &line)?,
        }
    }
}

fn stream_state(
    writer: &Mutex<LinkStream>,
    streaming: &AtomicBool,
    done: &AtomicBool,
    interval: Duration,
) {
    let mut value = 0u64;
    while !done.load(Ordering::SeqCst) {
        if streaming.load(Ordering::SeqCst) {
            if let Err(err) = write_line(writer, &format!("{STATE_TAG}:{value}\n")) {
                debug!(error = %err, "state stream stopped");
                return;
            }
            value += 1;
        }
        thread::sleep(interval);
    }
}

fn write_line(writer: &Mutex<LinkStream>, line: &str) -> CliResult<()> {
    let mut stream = writer.lock().unwrap_or_else(PoisonError::into_inner);
    stream
        .write_all(line.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|err| io_error("write failed", err))
}
