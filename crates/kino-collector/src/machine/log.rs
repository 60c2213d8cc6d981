//! Debug transition log

use crate::types::{State, Timestamp, Trigger};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One applied transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub event: Trigger,
    pub from: State,
    pub to: State,
    pub timestamp: Timestamp,
}

/// Ring buffer of the most recent transitions. Capacity 0 disables recording.
#[derive(Debug, Clone)]
pub struct StateLog {
    records: VecDeque<TransitionRecord>,
    capacity: Option<usize>,
}

impl StateLog {
    /// Keep at most `capacity` records, dropping the oldest
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity: Some(capacity),
        }
    }

    /// Keep every record
    pub fn unbounded() -> Self {
        Self {
            records: VecDeque::new(),
            capacity: None,
        }
    }

    pub fn disabled() -> Self {
        Self::with_capacity(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity != Some(0)
    }

    pub fn push(&mut self, record: TransitionRecord) {
        match self.capacity {
            Some(0) => return,
            Some(capacity) if self.records.len() >= capacity => {
                self.records.pop_front();
            }
            _ => {}
        }
        self.records.push_back(record);
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<TransitionRecord> {
        self.records.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records as a JSON array
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_vec()).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Default for StateLog {
    fn default() -> Self {
        Self::disabled()
    }
}
