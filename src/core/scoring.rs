//! Scaled Mean Distance (SMD) anomaly scoring.
//!
//! For every feature whose baseline has non-zero spread, the distance is
//! `|profile.mean - sample.mean| / profile.std_dev`. The SMD is the average of
//! those distances. Windows with too few keystrokes are marked inactive
//! instead of being scored.

use crate::core::features::Feature;
use crate::core::profile::{select_profile, Profile};
use crate::core::report::{ResultSeries, ScoredWindow};
use crate::core::windowing::WindowAggregate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default minimum keystrokes for a window to be scored.
pub const DEFAULT_INACTIVITY_THRESHOLD: u32 = 10;

/// Default SMD above which a window is flagged as suspicious.
pub const DEFAULT_SUSPICION_THRESHOLD: f64 = 1.2;

/// Policy constants for a scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Windows with fewer keystrokes than this are inactive
    pub inactivity_threshold: u32,
    /// Windows scoring strictly above this are suspicious
    pub suspicion_threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            inactivity_threshold: DEFAULT_INACTIVITY_THRESHOLD,
            suspicion_threshold: DEFAULT_SUSPICION_THRESHOLD,
        }
    }
}

impl ScoringPolicy {
    pub fn is_inactive(&self, stroke_count: u32) -> bool {
        stroke_count < self.inactivity_threshold
    }

    pub fn is_suspicious(&self, smd: f64) -> bool {
        smd > self.suspicion_threshold
    }
}

/// Errors reported by a scoring run.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("no subject identifier supplied")]
    MissingIdentity,
    #[error("not enough data: {available} window(s) recorded, at least {required} needed")]
    InsufficientHistory { available: usize, required: usize },
}

/// SMD of `sample` against `profile`. Zero-spread baseline features are skipped.
pub fn score(profile: &WindowAggregate, sample: &WindowAggregate) -> f64 {
    let mut sum = 0.0;
    let mut used = 0u32;

    for feature in Feature::ALL {
        let baseline = profile.stats(feature);
        if baseline.std_dev == 0 {
            continue;
        }
        let observed = sample.stats(feature);
        sum += baseline.mean.abs_diff(observed.mean) as f64 / baseline.std_dev as f64;
        used += 1;
    }

    if used == 0 {
        0.0
    } else {
        sum / used as f64
    }
}

/// Score every window of a history against an already chosen profile.
pub fn score_windows(
    windows: &[WindowAggregate],
    profile: &Profile,
    policy: &ScoringPolicy,
) -> Vec<ScoredWindow> {
    windows
        .iter()
        .enumerate()
        .map(|(index, window)| {
            let is_inactive = policy.is_inactive(window.stroke_count);
            let is_profile = index == profile.index;
            let smd = if is_profile || is_inactive {
                0.0
            } else {
                score(&profile.aggregate, window)
            };

            ScoredWindow {
                window_index: index,
                smd,
                is_profile,
                stroke_count: window.stroke_count,
                is_inactive,
            }
        })
        .collect()
}

/// Select a profile from `windows` and score the whole history against it.
pub fn analyze(
    subject_id: &str,
    windows: &[WindowAggregate],
    policy: &ScoringPolicy,
) -> Result<ResultSeries, ScoringError> {
    let subject_id = subject_id.trim();
    if subject_id.is_empty() {
        warn!("scoring requested without a subject id");
        return Err(ScoringError::MissingIdentity);
    }

    let profile = select_profile(windows)?;
    let points = score_windows(windows, &profile, policy);
    debug!(
        subject_id,
        windows = windows.len(),
        profile_index = profile.index,
        "scored window history"
    );

    Ok(ResultSeries::new(
        subject_id.to_string(),
        profile.index,
        *policy,
        points,
    ))
}
