//! Key event types for the capture boundary.
//!
//! Key codes are only used to pair a press with its release. They never
//! leave the feature extractor and are not part of any aggregate or record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical key identifier as reported by the input source (e.g. `KeyA`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub String);

impl KeyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transition direction of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEdge {
    Down,
    Up,
}

impl FromStr for KeyEdge {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "down" | "keydown" => Ok(KeyEdge::Down),
            "up" | "keyup" => Ok(KeyEdge::Up),
            other => Err(ParseEventError::Edge(other.to_string())),
        }
    }
}

/// A single key transition at a monotonic timestamp (milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub edge: KeyEdge,
    pub timestamp_ms: f64,
}

impl KeyEvent {
    pub fn down(code: impl Into<String>, timestamp_ms: f64) -> Self {
        Self {
            code: KeyCode::new(code),
            edge: KeyEdge::Down,
            timestamp_ms,
        }
    }

    pub fn up(code: impl Into<String>, timestamp_ms: f64) -> Self {
        Self {
            code: KeyCode::new(code),
            edge: KeyEdge::Up,
            timestamp_ms,
        }
    }
}

/// Errors produced when parsing a textual key event.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseEventError {
    #[error("expected `<code> <down|up> <timestamp_ms>`, got {0} field(s)")]
    FieldCount(usize),
    #[error("unknown key edge `{0}`")]
    Edge(String),
    #[error("invalid timestamp `{0}`")]
    Timestamp(String),
}

/// Parses the line format used on stdin: `<code> <down|up> <timestamp_ms>`.
impl FromStr for KeyEvent {
    type Err = ParseEventError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [code, edge, ts] = fields[..] else {
            return Err(ParseEventError::FieldCount(fields.len()));
        };

        let timestamp_ms: f64 = ts
            .parse()
            .map_err(|_| ParseEventError::Timestamp(ts.to_string()))?;
        if !timestamp_ms.is_finite() {
            return Err(ParseEventError::Timestamp(ts.to_string()));
        }

        Ok(Self {
            code: KeyCode::new(code),
            edge: edge.parse()?,
            timestamp_ms,
        })
    }
}
