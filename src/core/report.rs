//! Scored window series handed to rendering.
//!
//! The series carries no presentation data. Labels and the runs of
//! consecutive active windows are derived from the per-window flags.

use crate::core::scoring::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One window of a subject's history joined with its distance from the profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredWindow {
    pub window_index: usize,
    pub smd: f64,
    pub is_profile: bool,
    pub stroke_count: u32,
    pub is_inactive: bool,
}

/// Outcome category of a scored window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowLabel {
    Profile,
    Legitimate,
    Suspicious,
    Inactive,
}

impl WindowLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowLabel::Profile => "profile",
            WindowLabel::Legitimate => "legitimate",
            WindowLabel::Suspicious => "suspicious",
            WindowLabel::Inactive => "inactive",
        }
    }
}

impl fmt::Display for WindowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index-ordered scoring results for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSeries {
    subject_id: String,
    profile_index: usize,
    policy: ScoringPolicy,
    points: Vec<ScoredWindow>,
}

impl ResultSeries {
    pub fn new(
        subject_id: String,
        profile_index: usize,
        policy: ScoringPolicy,
        points: Vec<ScoredWindow>,
    ) -> Self {
        Self {
            subject_id,
            profile_index,
            policy,
            points,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn profile_index(&self) -> usize {
        self.profile_index
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn points(&self) -> &[ScoredWindow] {
        &self.points
    }

    pub fn profile(&self) -> Option<&ScoredWindow> {
        self.points.get(self.profile_index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Label a single point. The profile label wins over inactivity.
    pub fn label(&self, point: &ScoredWindow) -> WindowLabel {
        if point.is_profile {
            WindowLabel::Profile
        } else if point.is_inactive {
            WindowLabel::Inactive
        } else if self.policy.is_suspicious(point.smd) {
            WindowLabel::Suspicious
        } else {
            WindowLabel::Legitimate
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = (&ScoredWindow, WindowLabel)> + '_ {
        self.points.iter().map(move |p| (p, self.label(p)))
    }

    pub fn count(&self, label: WindowLabel) -> usize {
        self.labels().filter(|(_, l)| *l == label).count()
    }

    /// Index ranges of consecutive windows that are not inactive.
    pub fn active_runs(&self) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut start: Option<usize> = None;

        for point in &self.points {
            match (point.is_inactive, start) {
                (false, None) => start = Some(point.window_index),
                (true, Some(s)) => {
                    runs.push(s..point.window_index);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push(s..self.points.len());
        }

        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(window_index: usize, smd: f64, stroke_count: u32) -> ScoredWindow {
        ScoredWindow {
            window_index,
            smd,
            is_profile: false,
            stroke_count,
            is_inactive: stroke_count < 10,
        }
    }

    fn series() -> ResultSeries {
        let mut points = vec![
            point(0, 0.4, 40),
            point(1, 0.0, 90),
            point(2, 0.0, 3),
            point(3, 2.7, 55),
            point(4, 1.2, 61),
            point(5, 0.0, 0),
        ];
        points[1].is_profile = true;
        ResultSeries::new("subject-1".into(), 1, ScoringPolicy::default(), points)
    }

    #[test]
    fn test_labels() {
        let series = series();
        let labels: Vec<_> = series.labels().map(|(_, l)| l).collect();
        assert_eq!(
            labels,
            vec![
                WindowLabel::Legitimate,
                WindowLabel::Profile,
                WindowLabel::Inactive,
                WindowLabel::Suspicious,
                WindowLabel::Legitimate,
                WindowLabel::Inactive,
            ]
        );
        assert_eq!(series.count(WindowLabel::Inactive), 2);
        assert_eq!(series.profile().map(|p| p.stroke_count), Some(90));
    }

    #[test]
    fn test_sparse_profile_keeps_profile_label() {
        let mut points = vec![point(0, 0.0, 7), point(1, 0.0, 4)];
        points[0].is_profile = true;
        let series = ResultSeries::new("s".into(), 0, ScoringPolicy::default(), points);

        assert!(series.points()[0].is_inactive);
        assert_eq!(series.label(&series.points()[0]), WindowLabel::Profile);
    }

    #[test]
    fn test_active_runs() {
        assert_eq!(series().active_runs(), vec![0..2, 3..5]);

        let all_active = ResultSeries::new(
            "s".into(),
            0,
            ScoringPolicy::default(),
            vec![point(0, 0.0, 20), point(1, 0.3, 20)],
        );
        assert_eq!(all_active.active_runs(), vec![0..2]);
    }

    #[test]
    fn test_render_json_field_names() {
        let json = serde_json::to_value(series()).unwrap();
        assert_eq!(json["profileIndex"], 1);
        assert_eq!(json["points"][3]["windowIndex"], 3);
        assert_eq!(json["points"][3]["strokeCount"], 55);
        assert_eq!(json["points"][2]["isInactive"], true);
        assert_eq!(json["points"][1]["isProfile"], true);
    }
}
