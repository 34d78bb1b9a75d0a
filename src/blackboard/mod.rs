//! Shared fact store used for cross-agent coordination.
//!
//! # Model
//! - Every `put` appends a new entry stamped with the next global version.
//! - Entries are never rewritten; the newest entry per key is the current fact.
//! - Contradictory entries may coexist until `resolve_conflict` is called
//!   explicitly, so provenance of multi-agent runs is preserved.
//!
//! # Concurrency
//! Writes are serialized through a single mutex, which also publishes a
//! copy-on-write snapshot of the latest facts. Readers of the snapshot only
//! clone an `Arc` and never observe a torn view.

mod export;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One versioned fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactEntry {
    pub key: String,
    pub value: Value,
    /// Identity of the writer (agent id, tool name, device id)
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Global version, unique across all keys
    pub version: u64,
    /// Step identifiers this fact was derived from
    pub supporting_steps: Vec<String>,
}

#[derive(Default)]
struct BoardState {
    /// Every live entry, ascending by version.
    log: Vec<FactEntry>,
    /// Entries per key, oldest first.
    history: HashMap<String, Vec<FactEntry>>,
    /// Last version handed out (0 = nothing written yet).
    version: u64,
}

/// Append-only, versioned key/value store.
#[derive(Default)]
pub struct Blackboard {
    state: Mutex<BoardState>,
    latest: RwLock<Arc<HashMap<String, FactEntry>>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fact with full confidence and no supporting steps.
    pub fn put(&self, key: impl Into<String>, value: Value, author: impl Into<String>) -> u64 {
        self.put_with(key, value, author, 1.0, Vec::new())
    }

    /// Append a fact. Returns the version assigned to it.
    ///
    /// Confidence is clamped to [0, 1]. Writes never fail.
    pub fn put_with(
        &self,
        key: impl Into<String>,
        value: Value,
        author: impl Into<String>,
        confidence: f64,
        supporting_steps: Vec<String>,
    ) -> u64 {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.version += 1;

        let entry = FactEntry {
            key: key.into(),
            value,
            author: author.into(),
            timestamp: Utc::now(),
            confidence,
            version: state.version,
            supporting_steps,
        };

        state
            .history
            .entry(entry.key.clone())
            .or_default()
            .push(entry.clone());
        state.log.push(entry.clone());

        // Publish while still holding the writer lock so snapshots follow version order.
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut *latest).insert(entry.key.clone(), entry);

        state.version
    }

    /// Latest value for a key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.snapshot().get(key).map(|e| e.value.clone())
    }

    /// Latest entry (with metadata) for a key.
    pub fn get_entry(&self, key: &str) -> Option<FactEntry> {
        self.snapshot().get(key).cloned()
    }

    /// All entries for a key, oldest first.
    pub fn get_history(&self, key: &str) -> Vec<FactEntry> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.history.get(key).cloned().unwrap_or_default()
    }

    /// Map of every key to its latest value.
    pub fn get_all_facts(&self) -> HashMap<String, Value> {
        self.snapshot()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Consistent view of the latest entry per key.
    pub fn snapshot(&self) -> Arc<HashMap<String, FactEntry>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries with `version > since`, ascending by version.
    pub fn get_delta(&self, since: u64) -> Vec<FactEntry> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // Log is sorted by version; skip the prefix that is already known.
        let start = state.log.partition_point(|e| e.version <= since);
        state.log[start..].to_vec()
    }

    /// Version and entries read under one lock: every entry newer than
    /// `since`, or the latest entry per key when `since` is `None`.
    /// Ascending by version.
    pub(crate) fn versioned_entries(&self, since: Option<u64>) -> (u64, Vec<FactEntry>) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = match since {
            Some(since) => {
                let start = state.log.partition_point(|e| e.version <= since);
                state.log[start..].to_vec()
            }
            None => {
                let mut latest: Vec<FactEntry> = state
                    .history
                    .values()
                    .filter_map(|entries| entries.last().cloned())
                    .collect();
                latest.sort_by_key(|e| e.version);
                latest
            }
        };
        (state.version, entries)
    }

    /// Last version assigned (0 if empty).
    pub fn current_version(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    /// Keys with more than one entry carrying distinct values, sorted.
    pub fn detect_conflicts(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = state
            .history
            .iter()
            .filter(|(_, entries)| {
                entries.len() > 1 && entries.iter().any(|e| e.value != entries[0].value)
            })
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Collapse a key's history to its single highest-confidence entry.
    ///
    /// Ties on confidence go to the highest version. The surviving entry keeps
    /// its original version and the global counter does not advance. Returns
    /// the surviving entry, or `None` for an unknown key.
    pub fn resolve_conflict(&self, key: &str) -> Option<FactEntry> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = state.history.get(key)?;

        let winner = entries
            .iter()
            .max_by(|a, b| {
                a.confidence
                    .total_cmp(&b.confidence)
                    .then(a.version.cmp(&b.version))
            })?
            .clone();
        let dropped = entries.len() - 1;

        state.history.insert(key.to_string(), vec![winner.clone()]);
        state
            .log
            .retain(|e| e.key != key || e.version == winner.version);

        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut *latest).insert(key.to_string(), winner.clone());

        if dropped > 0 {
            tracing::info!(
                "Resolved conflict on '{}': kept v{} by {} (confidence {:.2}), dropped {} entries",
                key,
                winner.version,
                winner.author,
                winner.confidence,
                dropped
            );
        }

        Some(winner)
    }

    /// Number of keys with at least one entry.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
