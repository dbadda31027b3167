//! Bounded per-project history: one ring for edits and review events, one
//! for activity. Oldest entries fall off the front once a ring is full.

use std::collections::VecDeque;

use crate::types::{HistoryEntry, HistoryKind};

pub const DEFAULT_EDIT_CAPACITY: usize = 100;
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 200;

/// Default number of entries returned by the combined history view.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
/// Default number of entries returned by the edit history view.
pub const DEFAULT_EDIT_HISTORY_LIMIT: usize = 30;

#[derive(Debug, Clone)]
struct Ring {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    fn push(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }
}

#[derive(Debug, Clone)]
pub struct HistoryLedger {
    edits: Ring,
    activity: Ring,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_EDIT_CAPACITY, DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl HistoryLedger {
    #[must_use]
    pub fn new(edit_capacity: usize, activity_capacity: usize) -> Self {
        Self {
            edits: Ring::new(edit_capacity),
            activity: Ring::new(activity_capacity),
        }
    }

    /// Appends to the ring matching the entry's kind.
    pub fn append(&mut self, entry: HistoryEntry) {
        match entry.kind {
            HistoryKind::Activity => self.activity.push(entry),
            _ => self.edits.push(entry),
        }
    }

    /// Edit ring, newest first.
    #[must_use]
    pub fn edits(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        self.edits
            .newest_first()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Both rings merged newest first. Ties keep edits ahead of activity.
    #[must_use]
    pub fn list(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut edits = self.edits.newest_first().peekable();
        let mut activity = self.activity.newest_first().peekable();
        let mut out = Vec::new();

        while out.len() < limit {
            let next = match (edits.peek(), activity.peek()) {
                (Some(e), Some(a)) if a.timestamp > e.timestamp => activity.next(),
                (Some(_), _) => edits.next(),
                (None, Some(_)) => activity.next(),
                (None, None) => break,
            };
            if let Some(entry) = next {
                out.push(entry.clone());
            }
        }

        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.entries.len() + self.activity.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
