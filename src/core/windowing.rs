//! Fixed-duration window aggregation.
//!
//! Keystroke samples are buffered until the window timer fires, then reduced
//! to one [`WindowAggregate`]: integer mean and population standard
//! deviation per feature, plus the number of keystrokes.

use crate::collector::types::KeyEvent;
use crate::core::features::{round_half_up, Feature, FeatureExtractor, KeystrokeSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Mean and standard deviation of one feature over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStats {
    #[serde(default)]
    pub mean: i64,
    #[serde(default)]
    pub std_dev: i64,
}

impl FeatureStats {
    pub fn new(mean: i64, std_dev: i64) -> Self {
        Self { mean, std_dev }
    }

    /// Statistics over the non-sentinel values of `feature`.
    pub fn compute(samples: &[KeystrokeSample], feature: Feature) -> Self {
        let values: Vec<f64> = samples
            .iter()
            .filter_map(|s| s.value(feature))
            .map(|v| v as f64)
            .collect();

        if values.is_empty() {
            return Self::default();
        }

        let mean = values.iter().mean();
        let std_dev = values.iter().population_std_dev();

        Self {
            mean: round_half_up(mean),
            std_dev: round_half_up(std_dev),
        }
    }
}

/// Statistical summary of one observation window.
///
/// The JSON shape (`{"ud": {"mean", "std_dev"}, ..., "stroke_count"}`) is
/// the one returned by history fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAggregate {
    #[serde(default)]
    pub stroke_count: u32,
    #[serde(default)]
    pub ud: FeatureStats,
    #[serde(default)]
    pub du1: FeatureStats,
    #[serde(default)]
    pub du2: FeatureStats,
    #[serde(default)]
    pub dd: FeatureStats,
    #[serde(default)]
    pub uu: FeatureStats,
}

impl WindowAggregate {
    pub fn from_samples(samples: &[KeystrokeSample]) -> Self {
        Self {
            stroke_count: u32::try_from(samples.len()).unwrap_or(u32::MAX),
            ud: FeatureStats::compute(samples, Feature::Ud),
            du1: FeatureStats::compute(samples, Feature::Du1),
            du2: FeatureStats::compute(samples, Feature::Du2),
            dd: FeatureStats::compute(samples, Feature::Dd),
            uu: FeatureStats::compute(samples, Feature::Uu),
        }
    }

    /// An aggregate with the given stroke count and all-zero statistics.
    pub fn with_strokes(stroke_count: u32) -> Self {
        Self {
            stroke_count,
            ..Self::default()
        }
    }

    pub fn stats(&self, feature: Feature) -> FeatureStats {
        match feature {
            Feature::Ud => self.ud,
            Feature::Du1 => self.du1,
            Feature::Du2 => self.du2,
            Feature::Dd => self.dd,
            Feature::Uu => self.uu,
        }
    }

    pub fn stats_mut(&mut self, feature: Feature) -> &mut FeatureStats {
        match feature {
            Feature::Ud => &mut self.ud,
            Feature::Du1 => &mut self.du1,
            Feature::Du2 => &mut self.du2,
            Feature::Dd => &mut self.dd,
            Feature::Uu => &mut self.uu,
        }
    }
}

/// A flushed window with its position in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedWindow {
    /// Zero-based index of this window within the session
    pub index: u64,
    /// Wall-clock time the window opened
    pub start: DateTime<Utc>,
    /// Wall-clock time the window was flushed
    pub end: DateTime<Utc>,
    pub aggregate: WindowAggregate,
}

/// Buffers keystrokes for the current window and reduces them on flush.
#[derive(Debug)]
pub struct WindowAggregator {
    extractor: FeatureExtractor,
    buffer: Vec<KeystrokeSample>,
    window_start: DateTime<Utc>,
    next_index: u64,
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowAggregator {
    pub fn new() -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            buffer: Vec::new(),
            window_start: Utc::now(),
            next_index: 0,
        }
    }

    /// Feed a key event through the extractor, buffering any completed keystroke.
    pub fn record(&mut self, event: &KeyEvent) -> Option<KeystrokeSample> {
        let sample = self.extractor.process(event)?;
        self.buffer.push(sample);
        Some(sample)
    }

    /// Buffer an already-derived sample.
    pub fn push(&mut self, sample: KeystrokeSample) {
        self.buffer.push(sample);
    }

    /// Close the current window.
    ///
    /// The buffer is emptied and the extractor's previous-keystroke state is
    /// reset no matter what happens to the returned aggregate downstream.
    pub fn flush(&mut self) -> ClosedWindow {
        let samples = std::mem::take(&mut self.buffer);
        self.extractor.reset_window();

        let now = Utc::now();
        let closed = ClosedWindow {
            index: self.next_index,
            start: self.window_start,
            end: now,
            aggregate: WindowAggregate::from_samples(&samples),
        };

        self.next_index += 1;
        self.window_start = now;
        closed
    }

    /// Throw away the partial window and all extractor state, restarting the
    /// window numbering.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.extractor.reset();
        self.window_start = Utc::now();
        self.next_index = 0;
    }

    /// Number of keystrokes buffered in the current window.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ud: i64, du1: i64, dd: i64, uu: i64, du2: i64) -> KeystrokeSample {
        KeystrokeSample {
            ud,
            du1,
            dd,
            uu,
            du2,
        }
    }

    #[test]
    fn test_empty_flush() {
        let mut aggregator = WindowAggregator::new();
        let closed = aggregator.flush();

        assert_eq!(closed.index, 0);
        assert_eq!(closed.aggregate, WindowAggregate::default());
        assert_eq!(closed.aggregate.stroke_count, 0);
        for feature in Feature::ALL {
            assert_eq!(closed.aggregate.stats(feature), FeatureStats::new(0, 0));
        }
    }

    #[test]
    fn test_sentinels_are_excluded_from_statistics() {
        let samples = vec![
            sample(100, 0, 0, 0, 0),
            sample(120, 40, 160, 140, 280),
            sample(80, 60, 140, 100, 220),
        ];
        let aggregate = WindowAggregate::from_samples(&samples);

        // Stroke count includes the first keystroke
        assert_eq!(aggregate.stroke_count, 3);
        // ud has no sentinel: mean of all three
        assert_eq!(aggregate.ud.mean, 100);
        // the rest are averaged over the two non-sentinel values only
        assert_eq!(aggregate.du1, FeatureStats::new(50, 10));
        assert_eq!(aggregate.dd, FeatureStats::new(150, 10));
        assert_eq!(aggregate.uu, FeatureStats::new(120, 20));
        assert_eq!(aggregate.du2, FeatureStats::new(250, 30));
    }

    #[test]
    fn test_population_standard_deviation() {
        // 2,4,4,4,5,5,7,9 -> mean 5, population sd 2 (sample sd would be ~2.14)
        let samples: Vec<_> = [2, 4, 4, 4, 5, 5, 7, 9]
            .into_iter()
            .map(|ud| sample(ud, 0, 0, 0, 0))
            .collect();
        let stats = FeatureStats::compute(&samples, Feature::Ud);
        assert_eq!(stats, FeatureStats::new(5, 2));
    }

    #[test]
    fn test_negative_flight_is_kept() {
        let samples = vec![
            sample(90, 0, 0, 0, 0),
            sample(90, -30, 100, 100, 190),
            sample(90, -10, 100, 100, 190),
        ];
        let stats = FeatureStats::compute(&samples, Feature::Du1);
        assert_eq!(stats, FeatureStats::new(-20, 10));
    }

    #[test]
    fn test_flush_resets_window_state() {
        let mut aggregator = WindowAggregator::new();
        aggregator.record(&KeyEvent::down("KeyA", 0.0));
        aggregator.record(&KeyEvent::up("KeyA", 100.0));
        aggregator.record(&KeyEvent::down("KeyB", 200.0));
        aggregator.record(&KeyEvent::up("KeyB", 260.0));
        assert_eq!(aggregator.buffered(), 2);

        let first = aggregator.flush();
        assert_eq!(first.aggregate.stroke_count, 2);
        assert!(aggregator.is_empty());

        // First keystroke of the next window has no predecessor.
        aggregator.record(&KeyEvent::down("KeyC", 5_000.0));
        let sample = aggregator.record(&KeyEvent::up("KeyC", 5_090.0)).unwrap();
        assert_eq!(sample, KeystrokeSample { ud: 90, ..Default::default() });

        let second = aggregator.flush();
        assert_eq!(second.index, 1);
        assert_eq!(second.start, first.end);
        assert_eq!(second.aggregate.stroke_count, 1);
    }

    #[test]
    fn test_reset_discards_partial_window() {
        let mut aggregator = WindowAggregator::new();
        aggregator.push(sample(100, 0, 0, 0, 0));
        aggregator.flush();
        aggregator.push(sample(100, 0, 0, 0, 0));

        aggregator.reset();
        let closed = aggregator.flush();
        assert_eq!(closed.index, 0);
        assert_eq!(closed.aggregate.stroke_count, 0);
    }

    #[test]
    fn test_aggregate_json_shape() {
        let aggregate = WindowAggregate {
            stroke_count: 42,
            ud: FeatureStats::new(110, 12),
            ..Default::default()
        };
        let json = serde_json::to_value(aggregate).unwrap();
        assert_eq!(json["stroke_count"], 42);
        assert_eq!(json["ud"]["mean"], 110);
        assert_eq!(json["ud"]["std_dev"], 12);

        // Missing fields default to zero, as history rows may be sparse
        let parsed: WindowAggregate = serde_json::from_str(r#"{"stroke_count": 3}"#).unwrap();
        assert_eq!(parsed, WindowAggregate::with_strokes(3));
    }
}
