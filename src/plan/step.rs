//! Plan steps, their execution results and dependency ordering.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PlanError;
use crate::tools::Params;

/// One planned unit of work bound to a tool or action.
///
/// Steps are value objects: the planner creates them once and only the
/// associated `StepResult`/`Verification` change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub description: String,
    /// Action text; resolved against tool names when no override is given
    pub action: String,
    #[serde(default)]
    pub parameters: Params,
    /// Tool or capability names the step expects
    #[serde(default)]
    pub required_tools: Vec<String>,
    /// Planner's estimate, in seconds
    #[serde(default)]
    pub estimated_duration_secs: Option<u64>,
    /// Ids of steps that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Explicit tool override; wins over action matching
    #[serde(default)]
    pub tool_name: Option<String>,
}

impl Step {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            action: action.into(),
            parameters: Params::new(),
            required_tools: Vec::new(),
            estimated_duration_secs: None,
            dependencies: Vec::new(),
            tool_name: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Params) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_required_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

/// Terminal status of one step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    TimedOut,
}

/// Outcome of one execution attempt of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl StepResult {
    pub fn completed(
        step_id: impl Into<String>,
        result: Value,
        executed_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Completed,
            result: Some(result),
            error: None,
            executed_at,
            duration,
        }
    }

    pub fn failed(
        step_id: impl Into<String>,
        error: impl Into<String>,
        executed_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Failed,
            result: None,
            error: Some(error.into()),
            executed_at,
            duration,
        }
    }

    pub fn timed_out(
        step_id: impl Into<String>,
        error: impl Into<String>,
        executed_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            status: StepStatus::TimedOut,
            ..Self::failed(step_id, error, executed_at, duration)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Execution order respecting declared dependencies (topological sort).
///
/// Stable: among ready steps the one earliest in the list runs first, so a
/// plan without dependencies keeps its list order. Dependencies naming no
/// step in the list are ignored with a warning.
///
/// # Errors
/// `PlanError::CircularDependency` if the dependencies form a cycle.
pub fn execution_order(steps: &[Step]) -> Result<Vec<usize>, PlanError> {
    let n = steps.len();
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (i, step) in steps.iter().enumerate() {
        index.entry(step.id.as_str()).or_insert(i);
    }

    let mut in_degree = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, step) in steps.iter().enumerate() {
        for dep in &step.dependencies {
            match index.get(dep.as_str()) {
                Some(&d) if d == i => {
                    return Err(PlanError::CircularDependency(step.id.clone()));
                }
                Some(&d) => {
                    adj[d].push(i);
                    in_degree[i] += 1;
                }
                None => {
                    tracing::warn!(
                        "Step {} depends on unknown step '{}'; ignoring",
                        step.id,
                        dep
                    );
                }
            }
        }
    }

    // Kahn's algorithm, always taking the lowest ready index
    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &next in &adj[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() != n {
        let stuck = (0..n)
            .find(|&i| in_degree[i] > 0)
            .map(|i| steps[i].id.clone())
            .unwrap_or_default();
        return Err(PlanError::CircularDependency(stuck));
    }
    Ok(order)
}
