//! Transport records for flushed windows.
//!
//! A [`TelemetryRecord`] is what crosses the submission boundary: the window
//! statistics under their flat wire names (`strokeAmount`, `udMean`,
//! `udStdDev`, ...) tagged with subject, session and producer identity.

use crate::core::features::Feature;
use crate::core::windowing::{ClosedWindow, FeatureStats, WindowAggregate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The name of this producer.
pub const PRODUCER_NAME: &str = "keystroke-telemetry";

/// One window ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub subject_id: String,
    pub session_id: String,
    pub window_index: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// IANA timezone of the capturing client
    pub timezone: String,
    pub producer: String,
    pub producer_version: String,

    pub stroke_amount: u32,
    pub ud_mean: i64,
    pub ud_std_dev: i64,
    pub du1_mean: i64,
    pub du1_std_dev: i64,
    pub du2_mean: i64,
    pub du2_std_dev: i64,
    pub dd_mean: i64,
    pub dd_std_dev: i64,
    pub uu_mean: i64,
    pub uu_std_dev: i64,
}

impl TelemetryRecord {
    /// The window statistics carried by this record.
    pub fn aggregate(&self) -> WindowAggregate {
        WindowAggregate {
            stroke_count: self.stroke_amount,
            ud: FeatureStats::new(self.ud_mean, self.ud_std_dev),
            du1: FeatureStats::new(self.du1_mean, self.du1_std_dev),
            du2: FeatureStats::new(self.du2_mean, self.du2_std_dev),
            dd: FeatureStats::new(self.dd_mean, self.dd_std_dev),
            uu: FeatureStats::new(self.uu_mean, self.uu_std_dev),
        }
    }

    fn set_stats(&mut self, feature: Feature, stats: FeatureStats) {
        let (mean, std_dev) = match feature {
            Feature::Ud => (&mut self.ud_mean, &mut self.ud_std_dev),
            Feature::Du1 => (&mut self.du1_mean, &mut self.du1_std_dev),
            Feature::Du2 => (&mut self.du2_mean, &mut self.du2_std_dev),
            Feature::Dd => (&mut self.dd_mean, &mut self.dd_std_dev),
            Feature::Uu => (&mut self.uu_mean, &mut self.uu_std_dev),
        };
        *mean = stats.mean;
        *std_dev = stats.std_dev;
    }
}

/// Builds records for one capture session.
pub struct RecordBuilder {
    session_id: String,
    timezone: String,
}

impl RecordBuilder {
    /// Create a builder with a fresh random session ID.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            timezone: chrono_tz::Tz::UTC.to_string(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_timezone(mut self, timezone: chrono_tz::Tz) -> Self {
        self.timezone = timezone.to_string();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Package a flushed window for `subject_id`.
    pub fn build(&self, subject_id: &str, window: &ClosedWindow) -> TelemetryRecord {
        let mut record = TelemetryRecord {
            subject_id: subject_id.to_string(),
            session_id: self.session_id.clone(),
            window_index: window.index,
            window_start: window.start,
            window_end: window.end,
            timezone: self.timezone.clone(),
            producer: PRODUCER_NAME.to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            stroke_amount: window.aggregate.stroke_count,
            ud_mean: 0,
            ud_std_dev: 0,
            du1_mean: 0,
            du1_std_dev: 0,
            du2_mean: 0,
            du2_std_dev: 0,
            dd_mean: 0,
            dd_std_dev: 0,
            uu_mean: 0,
            uu_std_dev: 0,
        };
        for feature in Feature::ALL {
            record.set_stats(feature, window.aggregate.stats(feature));
        }
        record
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_window() -> ClosedWindow {
        let end = Utc::now();
        ClosedWindow {
            index: 4,
            start: end - chrono::Duration::seconds(60),
            end,
            aggregate: WindowAggregate {
                stroke_count: 37,
                ud: FeatureStats::new(95, 14),
                du1: FeatureStats::new(-12, 40),
                du2: FeatureStats::new(180, 33),
                dd: FeatureStats::new(170, 30),
                uu: FeatureStats::new(168, 29),
            },
        }
    }

    #[test]
    fn test_wire_field_names() {
        let builder = RecordBuilder::new().with_session_id("sess-1");
        let json = serde_json::to_value(builder.build("subject-9", &closed_window())).unwrap();

        assert_eq!(json["subjectId"], "subject-9");
        assert_eq!(json["sessionId"], "sess-1");
        assert_eq!(json["windowIndex"], 4);
        assert_eq!(json["strokeAmount"], 37);
        assert_eq!(json["udMean"], 95);
        assert_eq!(json["udStdDev"], 14);
        assert_eq!(json["du1Mean"], -12);
        assert_eq!(json["du1StdDev"], 40);
        assert_eq!(json["du2Mean"], 180);
        assert_eq!(json["ddStdDev"], 30);
        assert_eq!(json["uuMean"], 168);
        assert_eq!(json["producer"], PRODUCER_NAME);
    }

    #[test]
    fn test_record_carries_aggregate() {
        let window = closed_window();
        let record = RecordBuilder::new().build("subject-9", &window);
        assert_eq!(record.aggregate(), window.aggregate);
        assert_eq!(record.timezone, "UTC");
    }

    #[test]
    fn test_timezone_override() {
        let record = RecordBuilder::new()
            .with_timezone(chrono_tz::America::La_Paz)
            .build("subject-9", &closed_window());
        assert_eq!(record.timezone, "America/La_Paz");
    }
}
