//! Fire-and-forget submission of flushed windows.
//!
//! [`TelemetryEmitter::emit`] never blocks and never reports failure to its
//! caller. A window that cannot be delivered is logged and lost; the next
//! window is independent of it.

use crate::core::{ClosedWindow, RecordBuilder};
use crate::transparency::SharedTransparencyLog;
use crate::transport::WindowSink;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Packages windows into records and dispatches them to a [`WindowSink`].
pub struct TelemetryEmitter {
    subject_id: String,
    sink: Arc<dyn WindowSink>,
    builder: RecordBuilder,
    transparency: SharedTransparencyLog,
}

impl TelemetryEmitter {
    pub fn new(
        subject_id: impl Into<String>,
        sink: Arc<dyn WindowSink>,
        builder: RecordBuilder,
        transparency: SharedTransparencyLog,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            sink,
            builder,
            transparency,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn session_id(&self) -> &str {
        self.builder.session_id()
    }

    /// Dispatch `window` onto the current tokio runtime.
    ///
    /// Returns the handle of the spawned submission, or `None` when the
    /// window was dropped without contacting the transport.
    pub fn emit(&self, window: &ClosedWindow) -> Option<JoinHandle<()>> {
        let subject_id = self.subject_id.trim();
        if subject_id.is_empty() {
            warn!(
                window_index = window.index,
                "no subject id; dropping keystroke window"
            );
            self.transparency.record_window_dropped();
            return None;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(
                window_index = window.index,
                "no async runtime available; dropping keystroke window"
            );
            self.transparency.record_window_dropped();
            return None;
        };

        let record = self.builder.build(subject_id, window);
        let sink = Arc::clone(&self.sink);
        let transparency = Arc::clone(&self.transparency);

        Some(runtime.spawn(async move {
            match sink.submit_window(&record).await {
                Ok(()) => {
                    debug!(
                        window_index = record.window_index,
                        strokes = record.stroke_amount,
                        "keystroke window submitted"
                    );
                    transparency.record_window_submitted();
                }
                Err(e) => {
                    warn!(
                        window_index = record.window_index,
                        "error sending keystroke telemetry: {e}"
                    );
                    transparency.record_submission_failed();
                }
            }
        }))
    }
}
