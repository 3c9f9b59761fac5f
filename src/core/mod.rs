//! Core keystroke-dynamics pipeline.
//!
//! This module contains:
//! - Feature extraction from key transitions
//! - Window aggregation into per-feature statistics
//! - Transport records for flushed windows
//! - Profile selection and SMD scoring over a subject's history

pub mod features;
pub mod profile;
pub mod record;
pub mod report;
pub mod scoring;
pub mod windowing;

// Re-export commonly used types
pub use features::{Feature, FeatureExtractor, KeystrokeSample};
pub use profile::{select_profile, Profile, MIN_HISTORY_WINDOWS};
pub use record::{RecordBuilder, TelemetryRecord, PRODUCER_NAME};
pub use report::{ResultSeries, ScoredWindow, WindowLabel};
pub use scoring::{
    analyze, score, score_windows, ScoringError, ScoringPolicy, DEFAULT_INACTIVITY_THRESHOLD,
    DEFAULT_SUSPICION_THRESHOLD,
};
pub use windowing::{ClosedWindow, FeatureStats, WindowAggregate, WindowAggregator};
