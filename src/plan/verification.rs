//! Post-execution judgements of step outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Verdict on one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Partial,
    Failed,
    NeedsReplanning,
}

impl Verdict {
    /// Whether this verdict should trigger a replan.
    pub fn requires_replan(&self) -> bool {
        matches!(self, Verdict::Failed | Verdict::NeedsReplanning)
    }
}

/// Judgement of a single step's outcome.
///
/// # Invariants
/// - `step_id` names a step of the plan that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub step_id: String,
    pub verdict: Verdict,
    pub reasoning: String,
    pub issues: Vec<String>,
    pub evidence: Map<String, Value>,
}

impl Verification {
    pub fn success(step_id: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            verdict: Verdict::Success,
            reasoning: reasoning.into(),
            issues: Vec::new(),
            evidence: Map::new(),
        }
    }

    /// A failed verdict carrying `issue` as its sole issue.
    pub fn failed(step_id: impl Into<String>, issue: impl Into<String>) -> Self {
        let issue = issue.into();
        Self {
            step_id: step_id.into(),
            verdict: Verdict::Failed,
            reasoning: issue.clone(),
            issues: vec![issue],
            evidence: Map::new(),
        }
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = verdict;
        self
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: Value) -> Self {
        self.evidence.insert(key.into(), value);
        self
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Success
    }
}
