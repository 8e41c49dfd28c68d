use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use mculink_frame::Reply;
use mculink_transport::{Duplex, Endpoint};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::error::{Result, SendError, SessionError};
use crate::telemetry::{Clock, RateObserver, SystemClock, TelemetrySnapshot, TelemetryTracker};

/// A request/reply session with one device at a time.
///
/// `send` may be called from any number of threads. Each call gets its own
/// correlation id and waits only for the reply carrying that id.
pub struct Session {
    config: SessionConfig,
    telemetry: Arc<TelemetryTracker>,
    connection: Mutex<Option<Arc<Connection>>>,
    next_id: AtomicU64,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(config: SessionConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Take ownership of `stream` and start reading from it.
    ///
    /// A connection whose reader already exited is replaced; a live one is
    /// an error.
    pub fn connect<S: Duplex>(&self, stream: S) -> Result<()> {
        let mut slot = self.slot();
        if let Some(existing) = slot.take() {
            if existing.is_alive() {
                *slot = Some(existing);
                return Err(SessionError::AlreadyConnected);
            }
            debug!("replacing dead connection");
            existing.close();
        }

        let connection = Connection::open(stream, Arc::clone(&self.telemetry), &self.config)?;
        *slot = Some(Arc::new(connection));
        info!("session connected");
        Ok(())
    }

    /// Open `endpoint` and connect to it.
    pub fn connect_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        let stream = endpoint.connect()?;
        debug!(%endpoint, kind = stream.kind(), "link opened");
        self.connect(stream)
    }

    /// Close the current connection.
    ///
    /// Blocked senders return `ConnectionClosed` and telemetry stops.
    /// Returns `false` when nothing was connected.
    pub fn disconnect(&self) -> bool {
        let Some(connection) = self.slot().take() else {
            return false;
        };

        let reason = connection.close();
        self.telemetry.freeze();
        info!(reason = ?reason, "session disconnected");
        true
    }

    /// Whether a connection exists and its reader is still running.
    pub fn is_connected(&self) -> bool {
        self.slot().as_ref().is_some_and(|conn| conn.is_alive())
    }

    /// Send `command` and block until its reply arrives.
    ///
    /// The command must not contain a newline; one is appended on the wire.
    pub fn send(&self, command: &str) -> std::result::Result<Reply, SendError> {
        let connection = self.slot().clone().ok_or(SendError::NotConnected)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();

        let started = Instant::now();
        let result = connection.request(&id, command, self.config.response_timeout);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(body) => {
                debug!(correlation_id = %id, command, elapsed_ms, "reply received");
                Ok(Reply {
                    correlation_id: id,
                    body,
                })
            }
            Err(err) => {
                debug!(correlation_id = %id, command, elapsed_ms, error = %err, "request failed");
                Err(err)
            }
        }
    }

    /// Clear telemetry and ask the device to start streaming state updates.
    ///
    /// The tracker is cleared before the command goes out, since the device
    /// may stream its first updates ahead of the reply. If the command fails
    /// the previous telemetry is put back.
    pub fn begin_telemetry(&self) -> std::result::Result<Reply, SendError> {
        let saved = self.telemetry.reset_saving();
        match self.send(&self.config.begin_command) {
            Ok(reply) => Ok(reply),
            Err(err) => {
                self.telemetry.restore(saved);
                warn!(error = %err, "begin telemetry failed");
                Err(err)
            }
        }
    }

    /// Ask the device to stop streaming; telemetry freezes once it agrees.
    pub fn stop_telemetry(&self) -> std::result::Result<Reply, SendError> {
        match self.send(&self.config.stop_command) {
            Ok(reply) => {
                self.telemetry.freeze();
                Ok(reply)
            }
            Err(err) => {
                warn!(error = %err, "stop telemetry failed");
                Err(err)
            }
        }
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Requests currently waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.slot().as_ref().map_or(0, |conn| conn.pending_len())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &*self.slot())
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
    observer: Option<Arc<dyn RateObserver>>,
    clock: Arc<dyn Clock>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            observer: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive each measured state update rate.
    pub fn observer(mut self, observer: impl RateObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Time source for rate measurement.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Session {
        let telemetry = TelemetryTracker::new(self.clock, self.observer, self.config.rate_every);
        Session {
            config: self.config,
            telemetry: Arc::new(telemetry),
            connection: Mutex::new(None),
            next_id: AtomicU64::new(initial_id()),
        }
    }
}

// First correlation id: current wall-clock milliseconds.
fn initial_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_millis() as u64)
        .unwrap_or(1)
}
