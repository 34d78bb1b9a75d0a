//! Plan type and its lifecycle.
//!
//! # Invariants
//! - `steps` is non-empty
//! - Every recorded `StepResult`/`Verification` references a step of this plan
//! - `replanned_count` only increases across successors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Step, StepResult, Verification};

/// Unique identifier for a plan run.
///
/// Successor plans produced by replanning keep the id of the plan they
/// supersede, so facts and logs of one run share a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(Uuid);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a plan in its lifecycle.
///
/// # State Machine
/// ```text
/// Pending -> Planning -> Executing -> Verifying -> Completed
///                            ^             |   \-> Failed
///                            |             v
///                            +------ Replanning
/// (any non-terminal) -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Planning,
    Executing,
    Verifying,
    Replanning,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled
        )
    }

    /// Whether `self -> to` is an edge of the state machine.
    pub fn can_transition_to(&self, to: PlanStatus) -> bool {
        use PlanStatus::*;
        match (self, to) {
            (from, Cancelled) => !from.is_terminal(),
            (Pending, Planning)
            | (Planning, Executing)
            | (Planning, Failed)
            | (Executing, Verifying)
            | (Verifying, Completed)
            | (Verifying, Failed)
            | (Verifying, Replanning)
            | (Replanning, Executing)
            | (Replanning, Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Planning => "planning",
            PlanStatus::Executing => "executing",
            PlanStatus::Verifying => "verifying",
            PlanStatus::Replanning => "replanning",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of steps generated from a goal.
///
/// Owned by one engine run. Replanning does not mutate the step list; it
/// produces a successor via [`Plan::successor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    id: PlanId,
    goal: String,
    steps: Vec<Step>,
    status: PlanStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    replanned_count: u32,
    verifications: Vec<Verification>,
    step_results: Vec<StepResult>,
}

impl Plan {
    /// Create a pending plan.
    ///
    /// # Errors
    /// `PlanError::EmptyPlan` if `steps` is empty.
    pub fn new(goal: impl Into<String>, steps: Vec<Step>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::EmptyPlan);
        }
        Ok(Self {
            id: PlanId::new(),
            goal: goal.into(),
            steps,
            status: PlanStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            replanned_count: 0,
            verifications: Vec::new(),
            step_results: Vec::new(),
        })
    }

    /// Build the plan that supersedes this one after a replan.
    ///
    /// # Preconditions
    /// `self.status == Replanning`
    ///
    /// # Postconditions
    /// - Same id and goal, `replanned_count + 1`
    /// - Status `Replanning`, no results or verifications
    pub fn successor(&self, steps: Vec<Step>) -> Result<Self, PlanError> {
        if self.status != PlanStatus::Replanning {
            return Err(PlanError::InvalidTransition {
                from: self.status.to_string(),
                to: "successor".to_string(),
            });
        }
        if steps.is_empty() {
            return Err(PlanError::EmptyPlan);
        }
        Ok(Self {
            id: self.id,
            goal: self.goal.clone(),
            steps,
            status: PlanStatus::Replanning,
            created_at: Utc::now(),
            started_at: self.started_at,
            completed_at: None,
            replanned_count: self.replanned_count + 1,
            verifications: Vec::new(),
            step_results: Vec::new(),
        })
    }

    pub fn id(&self) -> PlanId {
        self.id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn replanned_count(&self) -> u32 {
        self.replanned_count
    }

    pub fn verifications(&self) -> &[Verification] {
        &self.verifications
    }

    pub fn step_results(&self) -> &[StepResult] {
        &self.step_results
    }

    /// Result recorded for a step in this pass, if any.
    pub fn result_for(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }

    /// Move along one edge of the state machine.
    ///
    /// # Errors
    /// `PlanError::InvalidTransition` if `to` is not reachable from the
    /// current status.
    pub fn transition(&mut self, to: PlanStatus) -> Result<(), PlanError> {
        if !self.status.can_transition_to(to) {
            return Err(PlanError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        if to == PlanStatus::Executing && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.status = to;
        Ok(())
    }

    /// Record a step result.
    ///
    /// # Errors
    /// `PlanError::UnknownStep` if the result references no step of this plan.
    pub fn record_result(&mut self, result: StepResult) -> Result<(), PlanError> {
        if self.step(&result.step_id).is_none() {
            return Err(PlanError::UnknownStep(result.step_id));
        }
        self.step_results.push(result);
        Ok(())
    }

    /// Record a verification.
    ///
    /// # Errors
    /// `PlanError::UnknownStep` if the verification references no step of this plan.
    pub fn record_verification(&mut self, verification: Verification) -> Result<(), PlanError> {
        if self.step(&verification.step_id).is_none() {
            return Err(PlanError::UnknownStep(verification.step_id));
        }
        self.verifications.push(verification);
        Ok(())
    }

    /// Whether any verification calls for a replan.
    pub fn needs_replan(&self) -> bool {
        self.verifications
            .iter()
            .any(|v| v.verdict.requires_replan())
    }

    /// Whether every verification is a success.
    pub fn all_verified(&self) -> bool {
        !self.verifications.is_empty() && self.verifications.iter().all(Verification::passed)
    }

    /// "stepId: reasoning" for every verification calling for a replan.
    pub fn failure_summary(&self) -> String {
        self.verifications
            .iter()
            .filter(|v| v.verdict.requires_replan())
            .map(|v| format!("{}: {}", v.step_id, v.reasoning))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Errors that can occur during plan operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("Plan has no steps")]
    EmptyPlan,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Circular dependency involving step {0}")]
    CircularDependency(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),
}
