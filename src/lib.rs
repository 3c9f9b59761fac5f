//! Keystroke Telemetry - keystroke-dynamics capture and impostor scoring.
//!
//! This library turns raw key press/release timing from an assessment
//! session into per-window statistics, and scores a subject's windows
//! against their own typing baseline.
//!
//! # Privacy Guarantees
//!
//! - **No key content**: key codes only pair presses with releases and are never stored
//! - **Window statistics only**: individual keystrokes never leave the current window
//! - **Transparency**: all collection is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Keystroke Telemetry                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐  │
//! │  │ Collector │──▶│ Features  │──▶│ Windowing  │──▶│ Emitter  │──┼─▶ WindowSink
//! │  │ (channel) │   │ (5/stroke)│   │ (60s bins) │   │ (spawn)  │  │
//! │  └───────────┘   └───────────┘   └────────────┘   └──────────┘  │
//! │                                                                  │
//! │  HistorySource ──▶ Profile ──▶ SMD scoring ──▶ ResultSeries      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use keystroke_telemetry::{
//!     collector::KeyEvent, core::RecordBuilder, session::TelemetrySession,
//!     store::WindowStore, transparency::create_shared_log, TelemetryEmitter,
//! };
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn run() {
//! let log = create_shared_log();
//! let store = Arc::new(WindowStore::new());
//! let emitter = TelemetryEmitter::new("subject-1", store, RecordBuilder::new(), log.clone());
//! let session = TelemetrySession::new(Duration::from_secs(60), emitter, log).unwrap();
//!
//! session.start().expect("inside a tokio runtime");
//! session.handle_event(&KeyEvent::down("KeyA", 0.0));
//! session.handle_event(&KeyEvent::up("KeyA", 95.0));
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod emitter;
pub mod session;
pub mod store;
pub mod transparency;
pub mod transport;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use collector::{ChannelCollector, CollectorConfig, CollectorError, KeyEvent};
pub use config::{Config, ConfigError};
pub use core::{
    analyze, score, select_profile, FeatureExtractor, ResultSeries, ScoredWindow, ScoringError,
    ScoringPolicy, TelemetryRecord, WindowAggregate, WindowAggregator, WindowLabel,
};
pub use emitter::TelemetryEmitter;
pub use session::{SessionError, TelemetrySession};
pub use store::{StoreError, WindowStore};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};
pub use transport::{HistorySource, TransportError, WindowSink};

#[cfg(feature = "gateway")]
pub use gateway::{GatewayClient, GatewayConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to participants.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║          KEYSTROKE TELEMETRY - PRIVACY DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This session records typing rhythm to verify that the same      ║
║  person completes the whole assessment.                          ║
║                                                                  ║
║  ✓ WHAT WE CAPTURE:                                              ║
║    • How long each key is held (timing only)                     ║
║    • The gaps between consecutive keys (timing only)             ║
║    • How many keys were pressed per minute                       ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Which keys you press (no answers, passwords, or text)       ║
║    • Individual keystrokes beyond the current minute             ║
║    • Anything outside the assessment page                        ║
║                                                                  ║
║  Every minute the timings are reduced to averages and spreads;   ║
║  only those summaries are sent.                                  ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
