//! Capture session lifecycle.
//!
//! A [`TelemetrySession`] owns the extractor/aggregator state for one subject
//! and a recurring timer that flushes the current window every
//! `window_duration`. Key events and flushes take the same lock, so a
//! keystroke lands either entirely before or entirely after a window swap.

use crate::collector::types::{KeyEdge, KeyEvent};
use crate::core::{ClosedWindow, KeystrokeSample, WindowAggregator};
use crate::emitter::TelemetryEmitter;
use crate::transparency::SharedTransparencyLog;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Default window length.
pub const DEFAULT_WINDOW_DURATION: Duration = Duration::from_secs(60);

/// Errors from session lifecycle calls.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is already running")]
    AlreadyRunning,
    #[error("session must be started from within a tokio runtime")]
    NoRuntime,
    #[error("window duration must be greater than zero")]
    ZeroWindow,
}

struct SessionState {
    aggregator: WindowAggregator,
    running: bool,
}

struct SessionInner {
    state: Mutex<SessionState>,
    emitter: TelemetryEmitter,
    transparency: SharedTransparencyLog,
}

impl SessionInner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush_and_emit(&self) -> Option<ClosedWindow> {
        let closed = {
            let mut state = self.state();
            if !state.running {
                return None;
            }
            state.aggregator.flush()
        };

        self.transparency.record_window_flushed();
        debug!(
            window_index = closed.index,
            strokes = closed.aggregate.stroke_count,
            "keystroke window flushed"
        );
        self.emitter.emit(&closed);
        Some(closed)
    }
}

/// Session-scoped keystroke capture with a periodic flush.
pub struct TelemetrySession {
    inner: Arc<SessionInner>,
    window_duration: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetrySession {
    pub fn new(
        window_duration: Duration,
        emitter: TelemetryEmitter,
        transparency: SharedTransparencyLog,
    ) -> Result<Self, SessionError> {
        if window_duration.is_zero() {
            return Err(SessionError::ZeroWindow);
        }

        Ok(Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    aggregator: WindowAggregator::new(),
                    running: false,
                }),
                emitter,
                transparency,
            }),
            window_duration,
            timer: Mutex::new(None),
        })
    }

    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }

    pub fn subject_id(&self) -> &str {
        self.inner.emitter.subject_id()
    }

    pub fn session_id(&self) -> &str {
        self.inner.emitter.session_id()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    /// Keystrokes buffered in the open window.
    pub fn buffered(&self) -> usize {
        self.inner.state().aggregator.buffered()
    }

    /// Begin capturing with fresh state and schedule the window timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        {
            let mut state = self.inner.state();
            if state.running {
                return Err(SessionError::AlreadyRunning);
            }
            state.aggregator.reset();
            state.running = true;
        }

        let inner = Arc::clone(&self.inner);
        let period = self.window_duration;
        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if inner.flush_and_emit().is_none() {
                    break;
                }
            }
        });

        if let Some(previous) = self.timer().replace(handle) {
            previous.abort();
        }

        info!(
            subject_id = self.subject_id(),
            session_id = self.session_id(),
            window_secs = period.as_secs_f64(),
            "keystroke telemetry started"
        );
        Ok(())
    }

    /// Stop the timer and discard the partial window.
    ///
    /// Returns how many buffered keystrokes were discarded.
    pub fn stop(&self) -> usize {
        if let Some(handle) = self.timer().take() {
            handle.abort();
        }

        let discarded = {
            let mut state = self.inner.state();
            let discarded = state.aggregator.buffered();
            state.running = false;
            state.aggregator.reset();
            discarded
        };

        info!(
            subject_id = self.subject_id(),
            discarded, "keystroke telemetry stopped"
        );
        discarded
    }

    /// Close the current window now and submit it.
    ///
    /// Returns `None` when the session is not running.
    pub fn flush(&self) -> Option<ClosedWindow> {
        self.inner.flush_and_emit()
    }

    /// Feed one key transition. Ignored while the session is stopped.
    pub fn handle_event(&self, event: &KeyEvent) -> Option<KeystrokeSample> {
        let sample = {
            let mut state = self.inner.state();
            if !state.running {
                return None;
            }
            state.aggregator.record(event)
        };

        let transparency = &self.inner.transparency;
        transparency.record_key_event();
        match (sample, event.edge) {
            (Some(_), _) => transparency.record_sample(),
            (None, KeyEdge::Up) => transparency.record_spurious_release(),
            (None, KeyEdge::Down) => {}
        }
        sample
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TelemetrySession {
    fn drop(&mut self) {
        if let Some(handle) = self.timer().take() {
            handle.abort();
        }
    }
}
