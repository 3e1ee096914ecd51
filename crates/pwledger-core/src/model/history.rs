use pwledger_core_types::Sensitive;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One previously used password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When this password stopped being current (Unix seconds)
    pub changed_at: i64,
    pub password: Sensitive<String>,
}

/// Bounded FIFO of prior passwords for a single entry
///
/// The header (`enabled`, `max`) and the list are independent: disabling
/// keeps the list, and lowering `max` through `set_max` trims from the
/// oldest end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHistory {
    pub enabled: bool,
    pub max: usize,
    entries: VecDeque<HistoryEntry>,
}

impl PasswordHistory {
    /// Create an empty history with the given header
    pub fn new(enabled: bool, max: usize) -> Self {
        Self {
            enabled,
            max,
            entries: VecDeque::new(),
        }
    }

    /// Rebuild a history from stored items, oldest first
    ///
    /// Items beyond `max` are kept: a store may legitimately hold more items
    /// than its current max after a bulk SetMax skipped it.
    pub fn from_entries(enabled: bool, max: usize, entries: Vec<HistoryEntry>) -> Self {
        Self {
            enabled,
            max,
            entries: entries.into(),
        }
    }

    /// Append a prior password, evicting oldest items while over `max`
    ///
    /// Returns the evicted items, oldest first. Does nothing when disabled.
    pub fn push(&mut self, password: Sensitive<String>, changed_at: i64) -> Vec<HistoryEntry> {
        if !self.enabled {
            return Vec::new();
        }
        self.entries.push_back(HistoryEntry {
            changed_at,
            password,
        });
        self.trim()
    }

    /// Change the max and trim to it
    pub fn set_max(&mut self, max: usize) -> Vec<HistoryEntry> {
        self.max = max;
        self.trim()
    }

    fn trim(&mut self) -> Vec<HistoryEntry> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.max {
            if let Some(oldest) = self.entries.pop_front() {
                evicted.push(oldest);
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Items, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
