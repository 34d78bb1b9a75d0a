//! Verification of executed steps.
//!
//! The engine asks a [`Verifier`] for a verdict on every (step, result) pair
//! after each execution pass. [`OutcomeVerifier`] judges by outcome alone:
//! a step that executed without error is verified successful. Richer
//! verifiers (programmatic checks, model review) plug in behind the same trait.

use async_trait::async_trait;
use serde_json::json;

use crate::plan::{Step, StepResult, StepStatus, Verification};

/// Produces a verdict for one executed step.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, step: &Step, result: &StepResult) -> Verification;
}

/// Verifier that trusts execution outcomes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutcomeVerifier;

#[async_trait]
impl Verifier for OutcomeVerifier {
    async fn verify(&self, step: &Step, result: &StepResult) -> Verification {
        let duration_ms = result.duration.as_millis() as u64;
        match result.status {
            StepStatus::Completed => {
                Verification::success(&step.id, "step executed without error")
                    .with_evidence("duration_ms", json!(duration_ms))
            }
            StepStatus::Failed | StepStatus::TimedOut => {
                let issue = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "step failed without an error message".to_string());
                Verification::failed(&step.id, issue).with_evidence("status", json!(result.status))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Verdict;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_success_and_failure_verdicts() {
        let step = Step::new("step_1", "add", "calculator");

        let ok = StepResult::completed("step_1", json!(5), Utc::now(), Duration::from_millis(3));
        let verdict = OutcomeVerifier.verify(&step, &ok).await;
        assert_eq!(verdict.verdict, Verdict::Success);
        assert_eq!(verdict.evidence["duration_ms"], json!(3));

        let bad = StepResult::timed_out("step_1", "Tool calculator timed out after 1s", Utc::now(), Duration::ZERO);
        let verdict = OutcomeVerifier.verify(&step, &bad).await;
        assert_eq!(verdict.verdict, Verdict::Failed);
        assert_eq!(verdict.issues, vec!["Tool calculator timed out after 1s"]);
        assert_eq!(verdict.evidence["status"], json!("timed_out"));
    }
}
