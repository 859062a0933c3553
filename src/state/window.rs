//! Trailing time window of event timestamps for velocity counts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlidingWindow {
    entries: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    /// Drop entries whose age is at least `width`. Entries are kept in arrival order,
    /// which is non-decreasing per subject, so eviction only ever touches the front.
    pub fn evict(&mut self, now: DateTime<Utc>, width: Duration) {
        while let Some(front) = self.entries.front() {
            if now - *front >= width {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn push(&mut self, ts: DateTime<Utc>) {
        self.entries.push_back(ts);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.entries.front().copied()
    }
}
