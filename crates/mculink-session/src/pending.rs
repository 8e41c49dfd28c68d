use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::SendError;

/// Why a correlation id could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// The id is already waiting for a reply.
    #[error("correlation id {0} is already pending")]
    AlreadyPending(String),

    /// The connection behind this table has gone away.
    #[error("pending table closed")]
    Closed,
}

enum Delivery {
    Reply(String),
    Closed,
}

struct Slot {
    tx: SyncSender<Delivery>,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    closed: bool,
}

/// Outstanding requests awaiting a reply, keyed by correlation id.
///
/// Senders register before writing, the reader thread fulfils. All map
/// operations happen under one mutex and none of them block on I/O. A slot
/// leaves the table exactly once: fulfilled, cancelled, or failed.
#[derive(Default)]
pub struct PendingTable {
    inner: Mutex<Inner>,
}

impl PendingTable {
    /// Create an empty, open table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert an empty slot for `id`.
    pub fn register(self: &Arc<Self>, id: &str) -> Result<PendingHandle, RegisterError> {
        let (tx, rx) = mpsc::sync_channel(1);

        let mut inner = self.lock();
        if inner.closed {
            return Err(RegisterError::Closed);
        }
        if inner.slots.contains_key(id) {
            return Err(RegisterError::AlreadyPending(id.to_string()));
        }
        inner.slots.insert(id.to_string(), Slot { tx });
        drop(inner);

        Ok(PendingHandle {
            id: id.to_string(),
            created_at: Instant::now(),
            rx,
            table: Arc::clone(self),
            resolved: false,
        })
    }

    /// Hand `body` to the waiter registered under `id`.
    ///
    /// Returns `false` when nobody is waiting, e.g. the request already timed out.
    pub fn fulfil(&self, id: &str, body: String) -> bool {
        let slot = self.lock().slots.remove(id);
        match slot {
            Some(slot) => {
                // Capacity 1 and a single delivery per slot: this never blocks.
                let _ = slot.tx.try_send(Delivery::Reply(body));
                true
            }
            None => false,
        }
    }

    /// Close the table and wake every waiter with `ConnectionClosed`.
    ///
    /// Later registrations fail with [`RegisterError::Closed`]. Returns the
    /// number of waiters woken.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<(String, Slot)> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.slots.drain().collect()
        };

        for (id, slot) in &drained {
            debug!(correlation_id = %id, "failing pending request: connection closed");
            let _ = slot.tx.try_send(Delivery::Closed);
        }
        drained.len()
    }

    /// Remove the slot for `id` without delivering anything.
    fn cancel(&self, id: &str) -> bool {
        self.lock().slots.remove(id).is_some()
    }

    /// Number of requests currently waiting.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// Whether no request is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the table has been failed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// The waiting side of one registered request.
///
/// Dropping an unresolved handle removes its slot from the table.
pub struct PendingHandle {
    id: String,
    created_at: Instant,
    rx: Receiver<Delivery>,
    table: Arc<PendingTable>,
    resolved: bool,
}

impl PendingHandle {
    /// Correlation id this handle waits on.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Time since the slot was registered.
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Block until the reply arrives, the connection closes, or `timeout` passes.
    pub fn wait(mut self, timeout: Duration) -> Result<String, SendError> {
        let delivery = match self.rx.recv_timeout(timeout) {
            Ok(delivery) => delivery,
            Err(RecvTimeoutError::Timeout) => {
                if self.table.cancel(&self.id) {
                    self.resolved = true;
                    return Err(SendError::Timeout(timeout));
                }
                // The slot was taken between the timeout and the cancel; its
                // delivery is already on the way.
                match self.rx.recv() {
                    Ok(delivery) => delivery,
                    Err(_) => {
                        self.resolved = true;
                        return Err(SendError::Timeout(timeout));
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => Delivery::Closed,
        };

        self.resolved = true;
        match delivery {
            Delivery::Reply(body) => Ok(body),
            Delivery::Closed => Err(SendError::ConnectionClosed),
        }
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        if !self.resolved {
            self.table.cancel(&self.id);
        }
    }
}

impl std::fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingHandle")
            .field("id", &self.id)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}
