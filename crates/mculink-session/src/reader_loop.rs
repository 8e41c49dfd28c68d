use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mculink_frame::{decode, DecodeError, FrameConfig, FrameError, FrameReader, Message};
use tracing::{debug, info, trace, warn};

use crate::pending::PendingTable;
use crate::telemetry::TelemetryTracker;

const THREAD_NAME: &str = "mculink-reader";

/// Why the reader loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// A stop was requested by the owning connection.
    Stopped,
    /// The device side closed the stream.
    Closed,
    /// Reading from the stream failed.
    ReadFailed(String),
}

/// Everything the reader thread shares with its connection.
pub(crate) struct LoopShared {
    pub pending: Arc<PendingTable>,
    pub telemetry: Arc<TelemetryTracker>,
    /// Link id from [`TelemetryTracker::attach`].
    pub link: u64,
    pub stop: Arc<AtomicBool>,
    pub alive: Arc<AtomicBool>,
}

/// Start the reader thread on `stream`.
///
/// When the loop ends, for whatever reason, every pending request is failed,
/// telemetry is frozen (if no newer connection has taken it over), and only then is `alive` cleared and the reason sent
/// on `exited`.
pub(crate) fn spawn<R>(
    stream: R,
    config: FrameConfig,
    shared: LoopShared,
    exited: Sender<ExitReason>,
) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            let mut reader = FrameReader::with_config(stream, config);
            let reason = run(&mut reader, &shared);

            let failed = shared.pending.fail_all();
            shared.telemetry.freeze_link(shared.link);
            shared.alive.store(false, Ordering::SeqCst);

            match &reason {
                ExitReason::ReadFailed(err) => {
                    warn!(error = %err, failed_requests = failed, "reader loop exited after read failure")
                }
                other => info!(reason = ?other, failed_requests = failed, "reader loop exited"),
            }
            let _ = exited.send(reason);
        })
}

fn run<R: Read>(reader: &mut FrameReader<R>, shared: &LoopShared) -> ExitReason {
    debug!("reader loop started");
    loop {
        if shared.stop.load(Ordering::SeqCst) {
            return ExitReason::Stopped;
        }

        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::FrameTooLong { len, max }) => {
                warn!(len, max, "dropping oversized frame");
                continue;
            }
            Err(_) if shared.stop.load(Ordering::SeqCst) => return ExitReason::Stopped,
            Err(FrameError::ConnectionClosed) => return ExitReason::Closed,
            Err(err) => return ExitReason::ReadFailed(err.to_string()),
        };

        dispatch(&frame, &shared.pending, &shared.telemetry);
    }
}

/// Route one frame to its consumer.
pub(crate) fn dispatch(frame: &[u8], pending: &PendingTable, telemetry: &TelemetryTracker) {
    match decode(frame) {
        Ok(Message::Reply(reply)) => {
            trace!(correlation_id = %reply.correlation_id, "reply received");
            if !pending.fulfil(&reply.correlation_id, reply.body) {
                debug!(
                    correlation_id = %reply.correlation_id,
                    "dropping reply with no waiting request"
                );
            }
        }
        Ok(Message::StateUpdate { body }) => telemetry.on_update(body),
        Err(DecodeError::Empty) => trace!("skipping empty frame"),
        Err(err) => warn!(
            error = %err,
            frame = %String::from_utf8_lossy(frame),
            "dropping undecodable frame"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    fn shared() -> LoopShared {
        let telemetry = Arc::new(TelemetryTracker::default());
        LoopShared {
            pending: Arc::new(PendingTable::new()),
            link: telemetry.attach(),
            telemetry,
            stop: Arc::new(AtomicBool::new(false)),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    #[test]
    fn dispatch_routes_reply_and_state() {
        let shared = shared();
        let handle = shared.pending.register("5").unwrap();

        dispatch(b"S:42", &shared.pending, &shared.telemetry);
        dispatch(b"R:5:ok", &shared.pending, &shared.telemetry);

        assert_eq!(handle.wait(Duration::from_secs(1)).unwrap(), "ok");
        assert_eq!(
            shared.telemetry.snapshot().latest_value.as_deref(),
            Some("42")
        );
    }

    #[test]
    fn dispatch_survives_garbage() {
        let shared = shared();
        dispatch(b"", &shared.pending, &shared.telemetry);
        dispatch(b"X:1", &shared.pending, &shared.telemetry);
        dispatch(b"R", &shared.pending, &shared.telemetry);
        dispatch(&[0xFF, b':', 0xFE], &shared.pending, &shared.telemetry);
        dispatch(b"R:999:nobody-waiting", &shared.pending, &shared.telemetry);

        assert!(shared.pending.is_empty());
        assert_eq!(shared.telemetry.snapshot().latest_value, None);
    }

    #[test]
    fn loop_processes_stream_then_reports_closed() {
        let shared = shared();
        let pending = Arc::clone(&shared.pending);
        let telemetry = Arc::clone(&shared.telemetry);
        let alive = Arc::clone(&shared.alive);
        let orphan = pending.register("1").unwrap();

        let (tx, rx) = mpsc::channel();
        let wire = b"S:1\nbogus\n\nS:2\n".to_vec();
        let handle = spawn(Cursor::new(wire), FrameConfig::default(), shared, tx).unwrap();

        let reason = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();

        assert_eq!(reason, ExitReason::Closed);
        assert!(!alive.load(Ordering::SeqCst));
        assert!(pending.is_closed());
        assert!(matches!(
            orphan.wait(Duration::from_secs(1)),
            Err(crate::SendError::ConnectionClosed)
        ));

        let snap = telemetry.snapshot();
        assert_eq!(snap.latest_value.as_deref(), Some("2"));
        assert!(snap.frozen);
    }

    #[test]
    fn superseded_loop_leaves_telemetry_running() {
        let shared = shared();
        let telemetry = Arc::clone(&shared.telemetry);
        telemetry.attach();

        let (tx, rx) = mpsc::channel();
        let handle = spawn(Cursor::new(Vec::new()), FrameConfig::default(), shared, tx).unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            ExitReason::Closed
        );
        handle.join().unwrap();
        assert!(!telemetry.snapshot().frozen);
    }

    #[test]
    fn read_failure_is_reported() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
            }
        }

        let (tx, rx) = mpsc::channel();
        let handle = spawn(Broken, FrameConfig::default(), shared(), tx).unwrap();

        let reason = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert!(matches!(reason, ExitReason::ReadFailed(_)));
    }

    #[test]
    fn stop_flag_set_before_start_exits_immediately() {
        let shared = shared();
        shared.stop.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel();
        let handle = spawn(Cursor::new(b"S:1\n".to_vec()), FrameConfig::default(), shared, tx)
            .unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            ExitReason::Stopped
        );
        handle.join().unwrap();
    }
}
