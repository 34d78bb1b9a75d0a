//! Core types for the agent system.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plan::{PlanError, StepResult};

/// Result of an agent executing a goal.
///
/// # Invariants
/// - If `success == false`, `error` explains why
/// - `steps_completed + steps_failed == steps.len()` for engine results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Whether the goal was achieved
    pub success: bool,

    /// Aggregated payload
    pub result: Option<Value>,

    /// Human-readable failure reason
    pub error: Option<String>,

    pub steps_completed: usize,

    pub steps_failed: usize,

    /// Per-step results of the final plan (or of every agent, for collaborations)
    #[serde(default)]
    pub steps: Vec<StepResult>,

    /// Run details (plan id, status, timings, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AgentResult {
    /// Create a successful result.
    pub fn success(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            steps_completed: 0,
            steps_failed: 0,
            steps: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Create a failure result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            steps_completed: 0,
            steps_failed: 0,
            steps: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Attach step results and derive the completed/failed counts from them.
    pub fn with_steps(mut self, steps: Vec<StepResult>) -> Self {
        self.steps_completed = steps.iter().filter(|s| s.is_success()).count();
        self.steps_failed = steps.len() - self.steps_completed;
        self.steps = steps;
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set the aggregated payload.
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Errors that can occur in agent operations.
///
/// These never escape `execute_task`: the engine converts them into a
/// failed `AgentResult`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("No capable agent found for task")]
    NoCapableAgent,

    #[error("cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_with_steps_counts() {
        let steps = vec![
            StepResult::completed("a", json!(1), Utc::now(), Duration::ZERO),
            StepResult::failed("b", "boom", Utc::now(), Duration::ZERO),
            StepResult::timed_out("c", "slow", Utc::now(), Duration::ZERO),
        ];
        let result = AgentResult::failure("partial").with_steps(steps);
        assert_eq!(result.steps_completed, 1);
        assert_eq!(result.steps_failed, 2);
    }

    #[test]
    fn test_roundtrip_without_optional_fields() {
        let result: AgentResult = serde_json::from_value(json!({
            "success": true,
            "result": 5,
            "error": null,
            "steps_completed": 1,
            "steps_failed": 0
        }))
        .unwrap();
        assert!(result.steps.is_empty());
        assert_eq!(result.result, Some(json!(5)));
    }
}
