//! Agents module - goal execution.
//!
//! # Components
//! - **PlanExecuteAgent**: plan-execute-verify-replan engine over a tool registry
//! - **Planner**: prompt building and defensive parsing of model plans
//! - **Verifier**: verdicts on executed steps (`OutcomeVerifier` by default)
//! - **TaskAnalyzer**: estimates complexity and required capabilities of a goal
//! - **AgentFactory**: builds engines only when the registry covers a goal's needs
//!
//! # Design Principles
//! - Collaborators (model, registry, blackboard) are injected, never global
//! - Every failure path resolves to an `AgentResult`, never a panic

mod analyzer;
mod engine;
mod factory;
mod planner;
mod types;
mod verifier;

pub use analyzer::{TaskAnalysis, TaskAnalyzer};
pub use engine::PlanExecuteAgent;
pub use factory::AgentFactory;
pub use planner::{PlanDraft, Planner};
pub use types::{AgentError, AgentResult};
pub use verifier::{OutcomeVerifier, Verifier};
