use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, trace};

use crate::config::DEFAULT_RATE_EVERY;

/// Source of the current time for rate calculations.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time via [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Receives the measured state update rate, in updates per second.
///
/// Called from the reader thread: implementations must return quickly and
/// never block (hand the value to a channel or queue instead).
pub trait RateObserver: Send + Sync {
    fn on_rate(&self, updates_per_second: u32);
}

impl<F> RateObserver for F
where
    F: Fn(u32) + Send + Sync,
{
    fn on_rate(&self, updates_per_second: u32) {
        self(updates_per_second)
    }
}

#[derive(Debug, Default)]
struct TelemetryState {
    latest_value: Option<String>,
    window_start: Option<Instant>,
    update_count: u64,
    last_rate: Option<u32>,
    frozen: bool,
}

/// Point-in-time copy of the telemetry state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Body of the most recent state update.
    pub latest_value: Option<String>,
    /// Updates counted since the window opened (the opening update excluded).
    pub update_count: u64,
    /// Most recent rate sample, in updates per second.
    pub last_rate: Option<u32>,
    /// Whether updates are currently being ignored.
    pub frozen: bool,
}

/// State set aside by [`TelemetryTracker::reset_saving`].
pub(crate) struct SavedTelemetry(TelemetryState);

/// Tracks the latest state value and how fast updates are arriving.
pub struct TelemetryTracker {
    state: Mutex<TelemetryState>,
    // Bumped for every connection opened against this tracker.
    link: AtomicU64,
    clock: Arc<dyn Clock>,
    observer: Option<Arc<dyn RateObserver>>,
    rate_every: u64,
}

impl Default for TelemetryTracker {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), None, DEFAULT_RATE_EVERY)
    }
}

impl TelemetryTracker {
    /// Create a tracker sampling the rate every `rate_every` updates.
    pub fn new(
        clock: Arc<dyn Clock>,
        observer: Option<Arc<dyn RateObserver>>,
        rate_every: u64,
    ) -> Self {
        Self {
            state: Mutex::new(TelemetryState::default()),
            link: AtomicU64::new(0),
            clock,
            observer,
            rate_every: rate_every.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TelemetryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one state update.
    ///
    /// The first update after a reset only opens the rate window. Every
    /// `rate_every`-th update after that computes
    /// `1000 * count / elapsed_ms` and notifies the observer; a sample with
    /// zero elapsed milliseconds is skipped.
    pub fn on_update(&self, body: String) {
        let rate = {
            let mut state = self.lock();
            if state.frozen {
                trace!("ignoring state update while telemetry is stopped");
                return;
            }
            state.latest_value = Some(body);

            let now = self.clock.now();
            let Some(start) = state.window_start else {
                state.window_start = Some(now);
                return;
            };

            state.update_count += 1;
            if state.update_count % self.rate_every != 0 {
                return;
            }

            let elapsed_ms = now.saturating_duration_since(start).as_millis();
            if elapsed_ms == 0 {
                debug!(
                    count = state.update_count,
                    "skipping rate sample: no time elapsed"
                );
                return;
            }

            let fps = u32::try_from(1000 * u128::from(state.update_count) / elapsed_ms)
                .unwrap_or(u32::MAX);
            state.last_rate = Some(fps);
            fps
        };

        debug!(updates_per_second = rate, "state update rate");
        if let Some(observer) = &self.observer {
            observer.on_rate(rate);
        }
    }

    /// Clear all state and start accepting updates again.
    pub fn reset(&self) {
        *self.lock() = TelemetryState::default();
    }

    /// Stop accepting updates, keeping what has been recorded.
    pub fn freeze(&self) {
        self.lock().frozen = true;
    }

    /// Reset, handing back the previous state so a failed restart can undo it.
    pub(crate) fn reset_saving(&self) -> SavedTelemetry {
        SavedTelemetry(std::mem::take(&mut *self.lock()))
    }

    /// Put back state taken by [`Self::reset_saving`].
    pub(crate) fn restore(&self, saved: SavedTelemetry) {
        *self.lock() = saved.0;
    }

    /// Register a new connection feeding this tracker and return its link id.
    ///
    /// Only the most recently attached link may freeze the tracker through
    /// [`Self::freeze_link`].
    pub(crate) fn attach(&self) -> u64 {
        self.link.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Freeze on behalf of `link`, unless a newer connection has attached since.
    pub(crate) fn freeze_link(&self, link: u64) {
        let mut state = self.lock();
        if self.link.load(Ordering::SeqCst) == link {
            state.frozen = true;
        } else {
            debug!(link, "stale link exited; telemetry left as is");
        }
    }

    /// Copy out the current state.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let state = self.lock();
        TelemetrySnapshot {
            latest_value: state.latest_value.clone(),
            update_count: state.update_count,
            last_rate: state.last_rate,
            frozen: state.frozen,
        }
    }
}

impl std::fmt::Debug for TelemetryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryTracker")
            .field("state", &*self.lock())
            .field("rate_every", &self.rate_every)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}
