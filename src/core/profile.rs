//! Baseline selection from a subject's window history.

use crate::core::scoring::ScoringError;
use crate::core::windowing::WindowAggregate;

/// Minimum number of windows needed before a profile can be chosen.
pub const MIN_HISTORY_WINDOWS: usize = 2;

/// The window chosen as a subject's authentic typing baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub index: usize,
    pub aggregate: WindowAggregate,
}

/// Pick the window with the most keystrokes. Ties go to the earliest window.
pub fn select_profile(windows: &[WindowAggregate]) -> Result<Profile, ScoringError> {
    if windows.len() < MIN_HISTORY_WINDOWS {
        return Err(ScoringError::InsufficientHistory {
            available: windows.len(),
            required: MIN_HISTORY_WINDOWS,
        });
    }

    let mut index = 0;
    for (i, window) in windows.iter().enumerate().skip(1) {
        if window.stroke_count > windows[index].stroke_count {
            index = i;
        }
    }

    Ok(Profile {
        index,
        aggregate: windows[index],
    })
}
