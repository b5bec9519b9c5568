//! Activity feed
//!
//! Append-only record of detector and workflow events plus integration
//! outcomes, merged into one time-ordered view for status reporting. The
//! merge is pure read-side assembly: it never mutates a source and tolerates
//! absent categories.

use crate::models::{ActivityCategory, ActivityEntry};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::RwLock;

/// Default retention for the internal feed
const DEFAULT_CAPACITY: usize = 500;

/// Bounded append-only buffer of activity entries
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when at capacity
    pub fn record(&self, entry: ActivityEntry) {
        let mut entries = self.entries.write().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn record_event(
        &self,
        category: ActivityCategory,
        timestamp: DateTime<Utc>,
        summary: impl Into<String>,
        reference: Option<String>,
    ) {
        self.record(ActivityEntry {
            category,
            timestamp,
            summary: summary.into(),
            reference,
        });
    }

    /// Most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let entries = self.entries.read().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Entries split per category, for read-side aggregation. Categories with
    /// no entries contribute nothing.
    pub fn category_feeds(&self) -> Vec<Vec<ActivityEntry>> {
        let entries = self.entries.read().unwrap();
        let mut feeds: std::collections::HashMap<ActivityCategory, Vec<ActivityEntry>> =
            std::collections::HashMap::new();
        for entry in entries.iter() {
            feeds.entry(entry.category).or_default().push(entry.clone());
        }
        feeds.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

/// Merge heterogeneous feeds into one view sorted by timestamp descending.
///
/// Empty feeds contribute nothing; the result is truncated to `limit`.
pub fn merge_feeds(feeds: &[Vec<ActivityEntry>], limit: usize) -> Vec<ActivityEntry> {
    let mut merged: Vec<ActivityEntry> = feeds.iter().flatten().cloned().collect();
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged.truncate(limit);
    merged
}
