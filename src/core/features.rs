//! Per-keystroke timing feature extraction.
//!
//! Every released key yields one [`KeystrokeSample`] with five latencies:
//! dwell (`ud`), flight (`du1`), press-to-press (`dd`), release-to-release
//! (`uu`) and press-to-release across keys (`du2`). Only timing leaves this
//! module; key codes are used for pairing and then forgotten.

use crate::collector::types::{KeyCode, KeyEdge, KeyEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The five timing features, in the order they are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Dwell: release minus press of the same key
    Ud,
    /// Flight: this press minus previous release (negative on overlap)
    Du1,
    /// This release minus previous press
    Du2,
    /// This press minus previous press
    Dd,
    /// This release minus previous release
    Uu,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Ud,
        Feature::Du1,
        Feature::Du2,
        Feature::Dd,
        Feature::Uu,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Ud => "ud",
            Feature::Du1 => "du1",
            Feature::Du2 => "du2",
            Feature::Dd => "dd",
            Feature::Uu => "uu",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived features of one keystroke, in whole milliseconds.
///
/// A value of `0` means "no previous key in this window" and is treated as
/// absent during aggregation. Use [`KeystrokeSample::value`] to read a
/// feature with that convention applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystrokeSample {
    pub ud: i64,
    pub du1: i64,
    pub dd: i64,
    pub uu: i64,
    pub du2: i64,
}

impl KeystrokeSample {
    /// Raw stored value, sentinel included.
    pub fn raw(&self, feature: Feature) -> i64 {
        match feature {
            Feature::Ud => self.ud,
            Feature::Du1 => self.du1,
            Feature::Du2 => self.du2,
            Feature::Dd => self.dd,
            Feature::Uu => self.uu,
        }
    }

    /// The feature value, or `None` when it holds the absent sentinel.
    pub fn value(&self, feature: Feature) -> Option<i64> {
        match self.raw(feature) {
            0 => None,
            v => Some(v),
        }
    }
}

/// Round half up, the way browser capture code (`Math.round`) does it.
pub(crate) fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Turns a stream of key transitions into keystroke samples.
#[derive(Debug, Default)]
pub struct FeatureExtractor {
    /// Outstanding press timestamp per key
    pending_downs: HashMap<KeyCode, f64>,
    /// Press time of the previous completed keystroke in this window
    last_down: Option<f64>,
    /// Release time of the previous completed keystroke in this window
    last_up: Option<f64>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event. Returns a sample when a release completes a keystroke.
    pub fn process(&mut self, event: &KeyEvent) -> Option<KeystrokeSample> {
        match event.edge {
            KeyEdge::Down => {
                // Auto-repeat keeps the first press time.
                self.pending_downs
                    .entry(event.code.clone())
                    .or_insert(event.timestamp_ms);
                None
            }
            KeyEdge::Up => {
                let down = self.pending_downs.remove(&event.code)?;
                Some(self.complete(down, event.timestamp_ms))
            }
        }
    }

    fn complete(&mut self, down: f64, up: f64) -> KeystrokeSample {
        let mut sample = KeystrokeSample {
            ud: round_half_up(up - down),
            ..KeystrokeSample::default()
        };

        if let Some(last_down) = self.last_down {
            sample.dd = round_half_up(down - last_down);
            sample.du2 = round_half_up(up - last_down);
        }
        if let Some(last_up) = self.last_up {
            sample.du1 = round_half_up(down - last_up);
            sample.uu = round_half_up(up - last_up);
        }

        self.last_down = Some(down);
        self.last_up = Some(up);
        sample
    }

    /// Forget the previous keystroke. Called at every window boundary.
    ///
    /// Keys still held stay pending and pair with their release in the next
    /// window.
    pub fn reset_window(&mut self) {
        self.last_down = None;
        self.last_up = None;
    }

    /// Forget everything, including held keys. Called when a session (re)starts.
    pub fn reset(&mut self) {
        self.pending_downs.clear();
        self.reset_window();
    }

    /// Number of keys currently held down.
    pub fn pending_count(&self) -> usize {
        self.pending_downs.len()
    }
}
