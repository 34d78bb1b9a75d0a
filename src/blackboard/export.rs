//! Blackboard export formats.
//!
//! - Tabular: one pipe-separated row per fact, compact enough to paste into a
//!   planner prompt.
//! - Structured: JSON with full entry metadata, for persistence or peers.
//!
//! Without `since`, both formats carry the current fact per key. With
//! `since = Some(v)`, they carry every entry newer than `v` (a delta).

use serde_json::{json, Value};

use super::Blackboard;

impl Blackboard {
    /// Compact pipe-separated table, ordered by version.
    pub fn to_table(&self, since: Option<u64>) -> String {
        let (version, entries) = self.versioned_entries(since);
        let mut out = match since {
            Some(v) => format!("# blackboard v{} since v{}\n", version, v),
            None => format!("# blackboard v{}\n", version),
        };
        out.push_str("version|key|value|author|confidence");

        for entry in entries {
            out.push('\n');
            out.push_str(&format!(
                "{}|{}|{}|{}|{:.2}",
                entry.version,
                cell(&entry.key),
                cell(&entry.value.to_string()),
                cell(&entry.author),
                entry.confidence
            ));
        }
        out
    }

    /// Verbose JSON export with full metadata.
    pub fn to_structured(&self, since: Option<u64>) -> Value {
        let (version, entries) = self.versioned_entries(since);
        json!({
            "version": version,
            "since": since,
            "facts": entries,
        })
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
