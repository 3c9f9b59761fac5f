//! Capture boundary for raw key events.
//!
//! Key events are produced outside this crate (browser bridge, stdin, tests)
//! and queued through a channel until a session consumes them.

pub mod channel;
pub mod types;

// Re-export commonly used types
pub use channel::{ChannelCollector, CollectorConfig, CollectorError, KeySender};
pub use types::{KeyCode, KeyEdge, KeyEvent, ParseEventError};
