//! Channel-backed collector.
//!
//! External input sources (a browser bridge, stdin, a test harness) push
//! key events through a [`KeySender`]; the consumer drains the receiver and
//! feeds a [`TelemetrySession`](crate::session::TelemetrySession).

use crate::collector::types::KeyEvent;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration for the channel collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum number of queued events before producers see backpressure
    pub capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Errors that can occur during event collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("Collector is not running")]
    NotRunning,
    #[error("Event queue is full")]
    QueueFull,
    #[error("Collector has been dropped")]
    Disconnected,
}

/// Producer handle given to the external input source.
#[derive(Clone)]
pub struct KeySender {
    sender: Sender<KeyEvent>,
    running: Arc<AtomicBool>,
}

impl KeySender {
    /// Queue an event. Events pushed while the collector is stopped are rejected.
    pub fn send(&self, event: KeyEvent) -> Result<(), CollectorError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::NotRunning);
        }
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => CollectorError::QueueFull,
            TrySendError::Disconnected(_) => CollectorError::Disconnected,
        })
    }
}

/// A collector whose events come from whoever holds a [`KeySender`].
pub struct ChannelCollector {
    sender: Option<Sender<KeyEvent>>,
    receiver: Receiver<KeyEvent>,
    running: Arc<AtomicBool>,
}

impl ChannelCollector {
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(config.capacity);
        Self {
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Hand out a producer handle.
    ///
    /// Returns `None` after [`close`](Self::close) so the receiver can observe
    /// disconnection once every outstanding handle is dropped.
    pub fn sender(&self) -> Option<KeySender> {
        self.sender.as_ref().map(|sender| KeySender {
            sender: sender.clone(),
            running: self.running.clone(),
        })
    }

    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Drop the collector's own sender. Once all producers are gone the
    /// receiver reports `Disconnected`.
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<KeyEvent> {
        &self.receiver
    }

    pub fn try_recv(&self) -> Option<KeyEvent> {
        self.receiver.try_recv().ok()
    }

    /// Discard everything currently queued, returning how many events were dropped.
    pub fn drain(&self) -> usize {
        self.receiver.try_iter().count()
    }
}
