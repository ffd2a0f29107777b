// Sliding time-window buffer for chart data
//
// Holds the readings visible in one chart panel, bounded to a fixed trailing
// horizon. The buffer is append-ordered and never re-sorted: the transport
// delivers each series in non-decreasing time order, so eviction is a cheap
// prefix trim from the head. A reading that arrives out of order beyond the
// configured tolerance is rejected and counted rather than silently
// mis-ordering the chart.

use crate::types::Reading;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Configuration for a sliding window
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Trailing duration to retain, in seconds
    pub horizon_secs: f64,

    /// How far behind the buffer tail a reading may arrive before it is
    /// rejected as out-of-order, in seconds
    pub reorder_tolerance: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            horizon_secs: 30.0,
            reorder_tolerance: 0.0,
        }
    }
}

/// Snapshot of buffer health for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStats {
    pub readings_stored: usize,
    pub readings_rejected: u64,
    pub oldest_age_secs: f64,
    pub newest_age_secs: f64,
    pub horizon_secs: f64,
}

/// Time-bounded, append-ordered reading buffer.
///
/// Owned by exactly one panel: written by its ingestion task, read by its
/// render scheduler. Consumers only ever see snapshots.
pub struct SlidingWindowBuffer {
    readings: RwLock<VecDeque<Reading>>,
    config: WindowConfig,
    rejected: AtomicU64,
}

impl SlidingWindowBuffer {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            readings: RwLock::new(VecDeque::new()),
            config,
            rejected: AtomicU64::new(0),
        }
    }

    pub fn horizon_secs(&self) -> f64 {
        self.config.horizon_secs
    }

    /// Append a reading at the tail.
    ///
    /// Returns false (and logs) when the reading is older than the current
    /// tail by more than the reorder tolerance. Equal timestamps keep their
    /// insertion order.
    pub fn insert(&self, reading: Reading) -> bool {
        let mut readings = self.readings.write();

        if let Some(tail) = readings.back() {
            if reading.time < tail.time - self.config.reorder_tolerance {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Rejecting out-of-order reading on '{}': t={} behind tail t={}",
                    reading.series,
                    reading.time,
                    tail.time
                );
                return false;
            }
        }

        readings.push_back(reading);
        true
    }

    /// Drop all readings older than the horizon relative to `now`.
    ///
    /// Prefix trim: scans from the head and stops at the first retained
    /// entry. Idempotent for a fixed `now`.
    pub fn evict(&self, now: f64) {
        let cutoff = now - self.config.horizon_secs;
        let mut readings = self.readings.write();

        while let Some(front) = readings.front() {
            if front.time < cutoff {
                readings.pop_front();
            } else {
                break;
            }
        }
    }

    /// Consistent point-in-time copy of the buffer contents, oldest first.
    ///
    /// Safe to hand to a renderer while inserts continue; inserts that happen
    /// after the snapshot is taken are never reflected in it.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }

    /// Readings rejected as out-of-order so far
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn stats(&self, now: f64) -> WindowStats {
        let readings = self.readings.read();

        WindowStats {
            readings_stored: readings.len(),
            readings_rejected: self.rejected.load(Ordering::Relaxed),
            oldest_age_secs: readings.front().map(|r| now - r.time).unwrap_or(0.0),
            newest_age_secs: readings.back().map(|r| now - r.time).unwrap_or(0.0),
            horizon_secs: self.config.horizon_secs,
        }
    }

    /// Clear all buffered readings
    pub fn clear(&self) {
        self.readings.write().clear();
    }
}
