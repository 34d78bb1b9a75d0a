//! Plan module - plans, steps, step results and verifications.
//!
//! All types are plain data with explicit, validated state transitions; the
//! engine in `agents` drives them.

#[allow(clippy::module_inception)]
pub mod plan;
mod step;
mod verification;

pub use plan::{Plan, PlanError, PlanId, PlanStatus};
pub use step::{execution_order, Step, StepResult, StepStatus};
pub use verification::{Verdict, Verification};
