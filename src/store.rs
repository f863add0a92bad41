//! Pattern store with a recency filter
//!
//! Patterns older than the retention window (relative to the caller-supplied
//! `now`) are pruned on every write. Reads return the newest patterns first.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::{config::ScannerConfig, Pattern, Result};

/// Default retention window, in hours
pub const DEFAULT_RETENTION_HOURS: i64 = 24;
/// Default number of patterns returned by [`PatternStore::recent`]
pub const DEFAULT_READ_LIMIT: usize = 50;

/// Thread-safe collection of recently detected patterns
#[derive(Debug)]
pub struct PatternStore {
    patterns: Mutex<Vec<Pattern>>,
    retention: Duration,
    read_limit: usize,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_RETENTION_HOURS))
    }
}

impl PatternStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            patterns: Mutex::new(Vec::new()),
            retention,
            read_limit: DEFAULT_READ_LIMIT,
        }
    }

    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = limit;
        self
    }

    pub fn from_config(config: &ScannerConfig) -> Result<Self> {
        Ok(Self::new(config.retention()?).with_read_limit(config.read_limit))
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Prune against `now`, then append `patterns`, under a single lock.
    ///
    /// Returns the number of patterns appended.
    pub fn record(&self, now: DateTime<Utc>, patterns: Vec<Pattern>) -> usize {
        let added = patterns.len();
        let mut guard = self.patterns.lock();
        let pruned = Self::prune_locked(&mut guard, self.cutoff(now));
        guard.extend(patterns);
        debug!(added, pruned, total = guard.len(), "pattern store updated");
        added
    }

    /// Drop patterns older than `now - retention`. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.patterns.lock();
        let pruned = Self::prune_locked(&mut guard, self.cutoff(now));
        if pruned > 0 {
            debug!(pruned, total = guard.len(), "pruned stale patterns");
        }
        pruned
    }

    /// Newest patterns first, at most `read_limit` of them.
    pub fn recent(&self) -> Vec<Pattern> {
        self.recent_n(self.read_limit)
    }

    /// Newest patterns first, at most `limit` of them.
    pub fn recent_n(&self, limit: usize) -> Vec<Pattern> {
        let mut snapshot = self.patterns.lock().clone();
        // stable: equal timestamps keep insertion order
        snapshot.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        snapshot.truncate(limit);
        snapshot
    }

    /// Every stored pattern in insertion order
    pub fn all(&self) -> Vec<Pattern> {
        self.patterns.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.patterns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.lock().is_empty()
    }

    pub fn clear(&self) {
        self.patterns.lock().clear();
    }

    /// Cutoff in epoch milliseconds; saturates instead of overflowing.
    fn cutoff(&self, now: DateTime<Utc>) -> i64 {
        now.checked_sub_signed(self.retention)
            .map_or(i64::MIN, |t| t.timestamp_millis())
    }

    fn prune_locked(patterns: &mut Vec<Pattern>, cutoff: i64) -> usize {
        let before = patterns.len();
        patterns.retain(|p| p.timestamp >= cutoff);
        before - patterns.len()
    }
}
