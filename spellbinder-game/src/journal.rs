//! In-game journal: a bounded, leveled message log mirrored to the `log` facade.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::Receiver;

use crate::constants::JOURNAL_CAPACITY;
use crate::events::{EventBus, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl JournalLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    const fn log_level(self) -> log::Level {
        match self {
            Self::Info | Self::Success => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for JournalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: u64,
    pub timestamp_ms: u64,
    pub level: JournalLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Bounded journal keeping the newest [`JOURNAL_CAPACITY`] entries.
#[derive(Debug)]
pub struct Journal {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
    next_id: u64,
    clock_ms: u64,
    bus: EventBus<JournalEntry>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(JOURNAL_CAPACITY)
    }
}

impl Journal {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(JOURNAL_CAPACITY)),
            capacity: capacity.max(1),
            next_id: 0,
            clock_ms: 0,
            bus: EventBus::new(),
        }
    }

    /// Timestamp applied to subsequent entries.
    pub const fn set_clock(&mut self, now_ms: u64) {
        self.clock_ms = now_ms;
    }

    pub fn record(
        &mut self,
        level: JournalLevel,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        let message = message.into();
        log::log!(target: "spellbinder::journal", level.log_level(), "{message}");
        let entry = JournalEntry {
            id: self.next_id,
            timestamp_ms: self.clock_ms,
            level,
            message,
            details,
        };
        self.next_id += 1;
        self.bus.publish(&entry);
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(JournalLevel::Info, message, None);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.record(JournalLevel::Success, message, None);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.record(JournalLevel::Warning, message, None);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(JournalLevel::Error, message, None);
    }

    #[must_use]
    pub fn entries(&self) -> &VecDeque<JournalEntry> {
        &self.entries
    }

    /// The newest `count` entries, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&JournalEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).collect()
    }

    #[must_use]
    pub fn count_level(&self, level: JournalLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<JournalEntry>) {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_entries_within_capacity() {
        let mut journal = Journal::with_capacity(3);
        for idx in 0..5 {
            journal.info(format!("entry {idx}"));
        }
        let messages: Vec<_> = journal.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
        assert_eq!(journal.entries().back().unwrap().id, 4);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut journal = Journal::default();
        journal.info("a");
        journal.warning("b");
        journal.error("c");
        let recent: Vec<_> = journal.recent(2).iter().map(|e| e.message.clone()).collect();
        assert_eq!(recent, vec!["b", "c"]);
        assert_eq!(journal.recent(10).len(), 3);
        assert_eq!(journal.count_level(JournalLevel::Warning), 1);
    }

    #[test]
    fn subscribers_see_new_entries_with_details() {
        let mut journal = Journal::default();
        journal.set_clock(1_500);
        let (id, rx) = journal.subscribe();
        journal.record(
            JournalLevel::Success,
            "learned",
            Some(serde_json::json!({ "spell": "fireball" })),
        );
        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.timestamp_ms, 1_500);
        assert_eq!(entry.details.unwrap()["spell"], "fireball");
        assert!(journal.unsubscribe(id));
        journal.clear();
        assert!(journal.entries().is_empty());
    }
}
