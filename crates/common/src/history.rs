//! Bounded record of recent entries, for in-memory services and brokers.

use std::collections::VecDeque;

/// Entries an in-memory history keeps unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 1024;

/// Keeps the latest `retention` entries and counts every entry pushed.
///
/// Older entries are dropped as new ones arrive, so a long-running demo
/// process holds at most `retention` of them.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    retention: usize,
    total: usize,
}

impl<T> History<T> {
    pub fn new(retention: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(retention.min(DEFAULT_RETENTION)),
            retention,
            total: 0,
        }
    }

    pub fn push(&mut self, entry: T) {
        self.total = self.total.saturating_add(1);
        if self.retention == 0 {
            return;
        }
        if self.entries.len() == self.retention {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries pushed over the history's life, including dropped ones.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Entries currently kept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Kept entries, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}
