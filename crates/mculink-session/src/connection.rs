use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use mculink_frame::CommandWriter;
use mculink_transport::Duplex;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SendError, SessionError};
use crate::pending::{PendingTable, RegisterError};
use crate::reader_loop::{self, ExitReason, LoopShared};
use crate::telemetry::TelemetryTracker;

type ReaderThread = (JoinHandle<()>, Receiver<ExitReason>);

// The OS rejects a zero write timeout.
const MIN_WRITE_TIMEOUT: Duration = Duration::from_millis(1);

/// One live link to a device: the write half, the reader thread, and the
/// table of requests waiting on it.
///
/// Closing is idempotent and also happens on drop.
pub struct Connection {
    writer: Mutex<CommandWriter<Box<dyn Duplex>>>,
    control: Mutex<Box<dyn Duplex>>,
    pending: Arc<PendingTable>,
    stop: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    reader: Mutex<Option<ReaderThread>>,
    join_timeout: Duration,
}

impl Connection {
    /// Split `stream` and start the reader thread on it.
    ///
    /// Writes are bounded by `write_timeout`, or by `response_timeout` when
    /// that is unset, so a device that stops reading cannot stall senders.
    pub fn open<S: Duplex>(
        stream: S,
        telemetry: Arc<TelemetryTracker>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let write_timeout = config
            .write_timeout
            .unwrap_or(config.response_timeout)
            .max(MIN_WRITE_TIMEOUT);
        stream.set_write_timeout(Some(write_timeout))?;

        let read_half = Duplex::try_clone(&stream)?;
        let control = Duplex::try_clone(&stream)?;

        let pending = Arc::new(PendingTable::new());
        let stop = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        let (exit_tx, exit_rx) = mpsc::channel();

        let shared = LoopShared {
            pending: Arc::clone(&pending),
            link: telemetry.attach(),
            telemetry,
            stop: Arc::clone(&stop),
            alive: Arc::clone(&alive),
        };
        let handle = reader_loop::spawn(read_half, config.frame.clone(), shared, exit_tx)
            .map_err(SessionError::Spawn)?;

        Ok(Self {
            writer: Mutex::new(CommandWriter::new(Box::new(stream))),
            control: Mutex::new(Box::new(control)),
            pending,
            stop,
            alive,
            reader: Mutex::new(Some((handle, exit_rx))),
            join_timeout: config.join_timeout,
        })
    }

    /// Write `<id>:<command>\n` and wait up to `timeout` for the reply body.
    pub fn request(
        &self,
        id: &str,
        command: &str,
        timeout: Duration,
    ) -> std::result::Result<String, SendError> {
        let handle = self.pending.register(id).map_err(|err| match err {
            RegisterError::AlreadyPending(id) => SendError::IdCollision(id),
            RegisterError::Closed => SendError::ConnectionClosed,
        })?;

        // On failure the handle drops here and takes its slot with it. A
        // write that timed out fails the same way.
        lock(&self.writer).send(id, command)?;

        handle.wait(timeout)
    }

    /// Stop the reader thread and fail everything still waiting.
    ///
    /// Returns the reader's exit reason the first time it is called, if the
    /// thread exited within the join timeout.
    pub fn close(&self) -> Option<ExitReason> {
        if self.stop.swap(true, Ordering::SeqCst) {
            return None;
        }

        if let Err(err) = lock(&self.control).shutdown() {
            debug!(error = %err, "transport shutdown failed");
        }

        let reader = lock(&self.reader).take();
        let reason = reader.and_then(|(handle, exited)| {
            match exited.recv_timeout(self.join_timeout) {
                Ok(reason) => {
                    if handle.join().is_err() {
                        warn!("reader thread panicked");
                    }
                    Some(reason)
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.join_timeout.as_millis() as u64,
                        "reader thread did not exit in time; detaching"
                    );
                    None
                }
            }
        });

        self.pending.fail_all();
        self.alive.store(false, Ordering::SeqCst);
        reason
    }

    /// Whether the reader thread is still running and no close was requested.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.stop.load(Ordering::SeqCst)
    }

    /// Number of requests waiting for a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("alive", &self.is_alive())
            .field("pending", &self.pending_len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
