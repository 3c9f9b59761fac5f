//! Transparency log of what was collected.
//!
//! Only counters are kept: no key codes, no timings, no subject data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Collection counters for the current process.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Key transitions received
    key_events: AtomicU64,
    /// Keystroke samples derived
    samples_derived: AtomicU64,
    /// Releases with no matching press
    spurious_releases: AtomicU64,
    /// Windows flushed by the aggregator
    windows_flushed: AtomicU64,
    /// Windows accepted by the transport
    windows_submitted: AtomicU64,
    /// Windows the transport rejected or could not reach
    submissions_failed: AtomicU64,
    /// Windows dropped before submission (no subject id, no runtime)
    windows_dropped: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            key_events: AtomicU64::new(0),
            samples_derived: AtomicU64::new(0),
            spurious_releases: AtomicU64::new(0),
            windows_flushed: AtomicU64::new(0),
            windows_submitted: AtomicU64::new(0),
            submissions_failed: AtomicU64::new(0),
            windows_dropped: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that accumulates into `path` across runs.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_key_event(&self) {
        self.key_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample(&self) {
        self.samples_derived.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spurious_release(&self) {
        self.spurious_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_flushed(&self) {
        self.windows_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_submitted(&self) {
        self.windows_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submission_failed(&self) {
        self.submissions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_dropped(&self) {
        self.windows_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            key_events: self.key_events.load(Ordering::Relaxed),
            samples_derived: self.samples_derived.load(Ordering::Relaxed),
            spurious_releases: self.spurious_releases.load(Ordering::Relaxed),
            windows_flushed: self.windows_flushed.load(Ordering::Relaxed),
            windows_submitted: self.windows_submitted.load(Ordering::Relaxed),
            submissions_failed: self.submissions_failed.load(Ordering::Relaxed),
            windows_dropped: self.windows_dropped.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Key events received: {}\n\
             - Keystrokes derived: {}\n\
             - Unmatched key releases: {}\n\
             - Windows flushed: {}\n\
             - Windows submitted: {}\n\
             - Submissions failed: {}\n\
             - Windows dropped: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No key content retained\n\
             - Only per-window timing statistics leave this device",
            stats.key_events,
            stats.samples_derived,
            stats.spurious_releases,
            stats.windows_flushed,
            stats.windows_submitted,
            stats.submissions_failed,
            stats.windows_dropped,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                key_events: stats.key_events,
                samples_derived: stats.samples_derived,
                spurious_releases: stats.spurious_releases,
                windows_flushed: stats.windows_flushed,
                windows_submitted: stats.windows_submitted,
                submissions_failed: stats.submissions_failed,
                windows_dropped: stats.windows_dropped,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.key_events
                    .store(persisted.key_events, Ordering::Relaxed);
                self.samples_derived
                    .store(persisted.samples_derived, Ordering::Relaxed);
                self.spurious_releases
                    .store(persisted.spurious_releases, Ordering::Relaxed);
                self.windows_flushed
                    .store(persisted.windows_flushed, Ordering::Relaxed);
                self.windows_submitted
                    .store(persisted.windows_submitted, Ordering::Relaxed);
                self.submissions_failed
                    .store(persisted.submissions_failed, Ordering::Relaxed);
                self.windows_dropped
                    .store(persisted.windows_dropped, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        for counter in [
            &self.key_events,
            &self.samples_derived,
            &self.spurious_releases,
            &self.windows_flushed,
            &self.windows_submitted,
            &self.submissions_failed,
            &self.windows_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub key_events: u64,
    pub samples_derived: u64,
    pub spurious_releases: u64,
    pub windows_flushed: u64,
    pub windows_submitted: u64,
    pub submissions_failed: u64,
    pub windows_dropped: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    key_events: u64,
    #[serde(default)]
    samples_derived: u64,
    #[serde(default)]
    spurious_releases: u64,
    #[serde(default)]
    windows_flushed: u64,
    #[serde(default)]
    windows_submitted: u64,
    #[serde(default)]
    submissions_failed: u64,
    #[serde(default)]
    windows_dropped: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
