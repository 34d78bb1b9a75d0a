//! Plan-execute-verify-replan engine.
//!
//! # Algorithm
//! 1. Ask the planner for steps (a fallback plan if its output is unusable)
//! 2. Execute every step in dependency order, one at a time, each under a
//!    deadline; a failing step never aborts the pass
//! 3. Verify every (step, result) pair
//! 4. If any verdict calls for it and attempts remain, replan and go to 2
//! 5. Aggregate the final plan into an `AgentResult`
//!
//! Cancellation is cooperative: the token is checked before each step and
//! before each replan. In-flight tool calls are not interrupted. Each run gets
//! a fresh token unless the caller supplied its own with `with_cancel_token`.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::planner::Planner;
use super::types::{AgentError, AgentResult};
use super::verifier::{OutcomeVerifier, Verifier};
use crate::blackboard::Blackboard;
use crate::config::EngineSettings;
use crate::llm::LanguageModel;
use crate::plan::{execution_order, Plan, PlanStatus, Step, StepResult};
use crate::tools::{Params, Tool, ToolError, ToolRegistry};

/// Single-agent engine executing goals against a tool registry.
pub struct PlanExecuteAgent {
    id: String,
    planner: Planner,
    tools: Arc<ToolRegistry>,
    verifier: Arc<dyn Verifier>,
    settings: EngineSettings,
    blackboard: Option<Arc<Blackboard>>,
    cancel_token: Mutex<CancellationToken>,
    /// Token owned by the caller; never replaced between runs
    external_token: bool,
    last_plan: Mutex<Option<Plan>>,
}

impl PlanExecuteAgent {
    pub fn new(
        id: impl Into<String>,
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            id: id.into(),
            planner: Planner::new(model, settings.llm_timeout),
            tools,
            verifier: Arc::new(OutcomeVerifier),
            settings,
            blackboard: None,
            cancel_token: Mutex::new(CancellationToken::new()),
            external_token: false,
            last_plan: Mutex::new(None),
        }
    }

    /// Replace the default outcome verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Record every successful step result on a shared blackboard.
    pub fn with_blackboard(mut self, blackboard: Arc<Blackboard>) -> Self {
        self.blackboard = Some(blackboard);
        self
    }

    /// Use an externally owned cancellation token for every run.
    ///
    /// Once that token is cancelled, later runs stop before planning.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Mutex::new(token);
        self.external_token = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Capability tags this engine's tools provide.
    pub fn capabilities(&self) -> Vec<String> {
        self.tools.capabilities()
    }

    /// Token of the current (or most recent) run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Request cooperative cancellation of the current run.
    pub fn cancel(&self) {
        self.cancel_token().cancel();
    }

    /// Token for a new run: a fresh one unless the caller owns it.
    fn begin_run(&self) -> CancellationToken {
        let mut current = self.cancel_token.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.external_token {
            *current = CancellationToken::new();
        }
        current.clone()
    }

    fn store_plan(&self, plan: Plan) {
        *self.last_plan.lock().unwrap_or_else(PoisonError::into_inner) = Some(plan);
    }

    /// Snapshot of the most recent plan, for diagnosis.
    pub fn last_plan(&self) -> Option<Plan> {
        self.last_plan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a goal end to end.
    ///
    /// Never fails: every error resolves to an `AgentResult` with
    /// `success == false` and a readable `error`.
    pub async fn execute_task(&self, goal: &str) -> AgentResult {
        self.execute_task_with(goal, &Params::new()).await
    }

    /// Execute a goal with caller-supplied parameters.
    ///
    /// The parameters are shown to the planner as context for the initial
    /// plan and for every replan.
    pub async fn execute_task_with(&self, goal: &str, context: &Params) -> AgentResult {
        let started = Instant::now();
        let token = self.begin_run();
        tracing::info!("Agent {} executing goal: {}", self.id, goal);

        match self.run(goal, context, &token, started).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Agent {} failed: {}", self.id, e);
                AgentResult::failure(e.to_string())
                    .with_metadata("status", json!(PlanStatus::Failed))
                    .with_metadata("elapsed_ms", json!(elapsed_ms(started)))
            }
        }
    }

    async fn run(
        &self,
        goal: &str,
        context: &Params,
        token: &CancellationToken,
        started: Instant,
    ) -> Result<AgentResult, AgentError> {
        if token.is_cancelled() {
            tracing::info!("Agent {} cancelled before planning", self.id);
            return Ok(AgentResult::failure(AgentError::Cancelled.to_string())
                .with_metadata("status", json!(PlanStatus::Cancelled))
                .with_metadata("elapsed_ms", json!(elapsed_ms(started))));
        }

        let draft = self.planner.plan(goal, context, &self.tools).await;
        let mut fallback_plan = draft.is_fallback();

        let mut plan = Plan::new(goal, draft.into_steps())?;
        let outcome = self
            .drive(&mut plan, &mut fallback_plan, context, token)
            .await;
        let result = outcome.map(|()| self.aggregate(&plan, fallback_plan, started));
        self.store_plan(plan);
        result
    }

    /// Move a fresh plan through execute/verify/replan until it settles.
    ///
    /// On error the plan keeps whatever state it reached.
    async fn drive(
        &self,
        plan: &mut Plan,
        fallback_plan: &mut bool,
        context: &Params,
        token: &CancellationToken,
    ) -> Result<(), AgentError> {
        plan.transition(PlanStatus::Planning)?;
        tracing::info!(
            "Plan {} created with {} steps{}",
            plan.id(),
            plan.steps().len(),
            if *fallback_plan { " (fallback)" } else { "" }
        );
        plan.transition(PlanStatus::Executing)?;

        loop {
            if !self.execute_steps(plan, token).await? {
                plan.transition(PlanStatus::Cancelled)?;
                return Ok(());
            }

            plan.transition(PlanStatus::Verifying)?;
            self.verify(plan).await?;

            if !plan.needs_replan() {
                let status = if plan.all_verified() {
                    PlanStatus::Completed
                } else {
                    PlanStatus::Failed
                };
                plan.transition(status)?;
                return Ok(());
            }

            if plan.replanned_count() >= self.settings.max_replan_attempts {
                tracing::warn!(
                    "Plan {} still failing after {} replans: {}",
                    plan.id(),
                    plan.replanned_count(),
                    plan.failure_summary()
                );
                plan.transition(PlanStatus::Failed)?;
                return Ok(());
            }

            if token.is_cancelled() {
                tracing::info!("Plan {} cancelled before replanning", plan.id());
                plan.transition(PlanStatus::Cancelled)?;
                return Ok(());
            }

            plan.transition(PlanStatus::Replanning)?;
            tracing::info!(
                "Replanning plan {} (attempt {}/{}): {}",
                plan.id(),
                plan.replanned_count() + 1,
                self.settings.max_replan_attempts,
                plan.failure_summary()
            );

            let draft = self.planner.replan(plan, context, &self.tools).await;
            *fallback_plan = draft.is_fallback();
            let next = plan.successor(draft.into_steps())?;
            *plan = next;
            plan.transition(PlanStatus::Executing)?;
        }
    }

    /// Run one pass over the plan. Returns `false` if cancelled mid-pass.
    async fn execute_steps(
        &self,
        plan: &mut Plan,
        token: &CancellationToken,
    ) -> Result<bool, AgentError> {
        let order = execution_order(plan.steps()).unwrap_or_else(|e| {
            tracing::warn!("{}; running steps in list order", e);
            (0..plan.steps().len()).collect()
        });

        for index in order {
            if token.is_cancelled() {
                tracing::info!("Plan {} cancelled between steps", plan.id());
                return Ok(false);
            }

            let step = plan.steps()[index].clone();
            let result = match unsatisfied_dependency(plan, &step) {
                Some(dep) => StepResult::failed(
                    &step.id,
                    format!("dependency {} not satisfied", dep),
                    Utc::now(),
                    Default::default(),
                ),
                None => self.execute_step(&step).await,
            };

            if let (Some(board), Some(value)) = (&self.blackboard, &result.result) {
                if result.is_success() {
                    board.put_with(
                        format!("{}/{}", plan.id(), step.id),
                        value.clone(),
                        self.id.as_str(),
                        1.0,
                        vec![step.id.clone()],
                    );
                }
            }

            plan.record_result(result)?;
        }
        Ok(true)
    }

    async fn execute_step(&self, step: &Step) -> StepResult {
        let executed_at = Utc::now();
        let start = Instant::now();

        let tool = match self.resolve_tool(step) {
            Ok(tool) => tool,
            Err(e) => {
                tracing::warn!("Step {}: {}", step.id, e);
                return StepResult::failed(&step.id, e.to_string(), executed_at, start.elapsed());
            }
        };

        let meta = tool.metadata();
        let timeout = self.settings.step_timeout.min(meta.timeout);
        tracing::info!("Executing step {} with tool {}", step.id, meta.name);

        match tokio::time::timeout(timeout, self.tools.execute(&meta.name, &step.parameters)).await
        {
            Ok(Ok(value)) => {
                tracing::info!("Step {} completed in {:?}", step.id, start.elapsed());
                StepResult::completed(&step.id, value, executed_at, start.elapsed())
            }
            Ok(Err(e)) => {
                tracing::warn!("Step {} failed: {}", step.id, e);
                StepResult::failed(&step.id, e.to_string(), executed_at, start.elapsed())
            }
            Err(_) => {
                let e = ToolError::Timeout {
                    tool: meta.name.clone(),
                    seconds: timeout.as_secs(),
                };
                tracing::warn!("Step {}: {}", step.id, e);
                StepResult::timed_out(&step.id, e.to_string(), executed_at, start.elapsed())
            }
        }
    }

    /// `tool_name` override, then action matching, then the first present
    /// required tool.
    fn resolve_tool(&self, step: &Step) -> Result<Arc<dyn Tool>, ToolError> {
        if let Some(name) = &step.tool_name {
            return self
                .tools
                .get(name)
                .ok_or_else(|| ToolError::NotFound(name.clone()));
        }

        if let Some(tool) = self.tools.find_by_action(&step.action).into_iter().next() {
            return Ok(tool);
        }

        step.required_tools
            .iter()
            .find_map(|name| self.tools.get(name))
            .ok_or_else(|| ToolError::NotFound(step.action.clone()))
    }

    async fn verify(&self, plan: &mut Plan) -> Result<(), AgentError> {
        let pairs: Vec<(Step, StepResult)> = plan
            .steps()
            .iter()
            .filter_map(|step| plan.result_for(&step.id).map(|r| (step.clone(), r.clone())))
            .collect();

        for (step, result) in pairs {
            let verification = self.verifier.verify(&step, &result).await;
            tracing::debug!("Step {} verified: {:?}", step.id, verification.verdict);
            plan.record_verification(verification)?;
        }
        Ok(())
    }

    fn aggregate(&self, plan: &Plan, fallback_plan: bool, started: Instant) -> AgentResult {
        let steps = plan.step_results().to_vec();
        let payload = match steps.as_slice() {
            [only] => only.result.clone().unwrap_or(Value::Null),
            many => Value::Array(
                many.iter()
                    .map(|s| s.result.clone().unwrap_or(Value::Null))
                    .collect(),
            ),
        };

        let mut result = match plan.status() {
            PlanStatus::Completed => AgentResult::success(payload),
            PlanStatus::Cancelled => {
                AgentResult::failure(AgentError::Cancelled.to_string()).with_result(payload)
            }
            _ => {
                let summary = plan.failure_summary();
                let error = if summary.is_empty() {
                    "not every step was verified successful".to_string()
                } else {
                    summary
                };
                AgentResult::failure(error).with_result(payload)
            }
        }
        .with_steps(steps);

        let metadata = [
            ("plan_id", json!(plan.id().to_string())),
            ("status", json!(plan.status())),
            ("replanned_count", json!(plan.replanned_count())),
            ("steps_completed", json!(result.steps_completed)),
            ("steps_failed", json!(result.steps_failed)),
            ("elapsed_ms", json!(elapsed_ms(started))),
            ("fallback_plan", json!(fallback_plan)),
            ("verifications", json!(plan.verifications())),
        ];
        for (key, value) in metadata {
            result.metadata.insert(key.to_string(), value);
        }

        tracing::info!(
            "Plan {} finished {}: {} completed, {} failed, {} replans",
            plan.id(),
            plan.status(),
            result.steps_completed,
            result.steps_failed,
            plan.replanned_count()
        );
        result
    }
}

/// First declared dependency (naming a step of this plan) that has not
/// completed successfully.
fn unsatisfied_dependency<'a>(plan: &Plan, step: &'a Step) -> Option<&'a str> {
    step.dependencies
        .iter()
        .filter(|dep| plan.step(dep).is_some())
        .find(|dep| !plan.result_for(dep).is_some_and(StepResult::is_success))
        .map(String::as_str)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::tools::{Calculator, Params, ToolMetadata};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Sleepy {
        meta: ToolMetadata,
    }

    #[async_trait]
    impl Tool for Sleepy {
        fn metadata(&self) -> &ToolMetadata {
            &self.meta
        }

        async fn execute(&self, _params: &Params) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!("woke up"))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Calculator::new()));
        registry.register(Arc::new(Sleepy {
            meta: ToolMetadata::new("sleepy", "never finishes in time")
                .with_timeout(Duration::from_secs(10)),
        }));
        Arc::new(registry)
    }

    fn agent(replies: &[&str]) -> PlanExecuteAgent {
        let model = ScriptedModel::new(replies.iter().copied());
        PlanExecuteAgent::new("agent-1", Arc::new(model), registry(), EngineSettings::default())
    }

    const ADD: &str = r#"{"steps": [{"id": "step_1", "description": "add", "action": "calculator",
        "tool_name": "calculator", "parameters": {"operation": "add", "a": 2, "b": 3}}]}"#;

    #[tokio::test]
    async fn test_single_step_success() {
        let agent = agent(&[ADD]);
        let result = agent.execute_task("add 2 and 3").await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.result, Some(json!(5)));
        assert_eq!(result.steps_completed, 1);
        assert_eq!(result.metadata["status"], json!("completed"));
        assert_eq!(result.metadata["replanned_count"], json!(0));
        assert_eq!(result.metadata["fallback_plan"], json!(false));

        let plan = agent.last_plan().unwrap();
        assert_eq!(plan.status(), PlanStatus::Completed);
        assert_eq!(plan.verifications().len(), 1);
    }

    #[tokio::test]
    async fn test_replans_until_success() {
        let missing = r#"{"steps": [{"id": "s1", "action": "camera", "tool_name": "camera"}]}"#;
        let agent = agent(&[missing, ADD]);
        let result = agent.execute_task("add 2 and 3").await;

        assert!(result.success);
        assert_eq!(result.metadata["replanned_count"], json!(1));
    }

    #[tokio::test]
    async fn test_failing_step_does_not_abort_pass() {
        let reply = r#"{"steps": [
            {"id": "a", "action": "calculator", "parameters": {"operation": "divide", "a": 1, "b": 0}},
            {"id": "b", "action": "calculator", "parameters": {"operation": "multiply", "a": 4, "b": 5}}
        ]}"#;
        let model = ScriptedModel::repeating(reply);
        let settings = EngineSettings {
            max_replan_attempts: 0,
            ..EngineSettings::default()
        };
        let agent = PlanExecuteAgent::new("agent-1", Arc::new(model), registry(), settings);

        let result = agent.execute_task("compute").await;
        assert!(!result.success);
        assert_eq!(result.steps_completed, 1);
        assert_eq!(result.steps_failed, 1);
        assert_eq!(result.result, Some(json!([null, 20])));
        assert!(result.error.unwrap().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_dependencies_reorder_and_gate_steps() {
        let reply = r#"{"steps": [
            {"id": "sum", "action": "calculator", "dependencies": ["bad"],
             "parameters": {"operation": "add", "a": 1, "b": 1}},
            {"id": "bad", "action": "calculator", "parameters": {"operation": "pow", "a": 1, "b": 1}}
        ]}"#;
        let model = ScriptedModel::repeating(reply);
        let settings = EngineSettings {
            max_replan_attempts: 0,
            ..EngineSettings::default()
        };
        let agent = PlanExecuteAgent::new("agent-1", Arc::new(model), registry(), settings);

        let result = agent.execute_task("add after bad").await;
        let ids: Vec<&str> = result.steps.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(ids, vec!["bad", "sum"]);
        assert_eq!(
            result.steps[1].error.as_deref(),
            Some("dependency bad not satisfied")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_uses_tool_deadline() {
        let reply = r#"{"steps": [{"id": "nap", "action": "sleepy"}]}"#;
        let model = ScriptedModel::repeating(reply);
        let settings = EngineSettings {
            max_replan_attempts: 0,
            ..EngineSettings::default()
        };
        let agent = PlanExecuteAgent::new("agent-1", Arc::new(model), registry(), settings);

        let result = agent.execute_task("take a nap").await;
        assert!(!result.success);
        assert_eq!(result.steps[0].status, crate::plan::StepStatus::TimedOut);
        assert_eq!(
            result.steps[0].error.as_deref(),
            Some("Tool sleepy timed out after 10s")
        );
    }

    #[tokio::test]
    async fn test_unparseable_plan_uses_fallback() {
        // Fallback step's action is the goal text, which names the calculator
        let agent = agent(&["I cannot produce JSON today"]);
        let result = agent.execute_task("use the calculator").await;

        assert_eq!(result.metadata["fallback_plan"], json!(true));
        assert!(!result.success);
        assert!(agent.last_plan().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        let agent = agent(&[ADD]).with_cancel_token(token.clone());
        token.cancel();
        let result = agent.execute_task("add 2 and 3").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
        assert_eq!(result.metadata["status"], json!("cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_only_affects_one_run() {
        let agent = agent(&[ADD, ADD]);
        agent.cancel();

        let first = agent.execute_task("add 2 and 3").await;
        let second = agent.execute_task("add 2 and 3").await;
        assert!(first.success, "{:?}", first.error);
        assert!(second.success, "{:?}", second.error);
    }

    /// Cancels the given token when executed.
    struct Tripwire {
        meta: ToolMetadata,
        token: CancellationToken,
    }

    #[async_trait]
    impl Tool for Tripwire {
        fn metadata(&self) -> &ToolMetadata {
            &self.meta
        }

        async fn execute(&self, _params: &Params) -> anyhow::Result<Value> {
            self.token.cancel();
            Ok(json!("tripped"))
        }
    }

    struct Counter {
        meta: ToolMetadata,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for Counter {
        fn metadata(&self) -> &ToolMetadata {
            &self.meta
        }

        async fn execute(&self, _params: &Params) -> anyhow::Result<Value> {
            Ok(json!(self.calls.fetch_add(1, Ordering::SeqCst) + 1))
        }
    }

    fn cancelling_registry(token: &CancellationToken, calls: &Arc<AtomicUsize>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Calculator::new()));
        registry.register(Arc::new(Tripwire {
            meta: ToolMetadata::new("tripwire", "cancels the run"),
            token: token.clone(),
        }));
        registry.register(Arc::new(Counter {
            meta: ToolMetadata::new("counter", "counts calls"),
            calls: Arc::clone(calls),
        }));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_cancel_between_steps_skips_the_rest() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let reply = r#"{"steps": [
            {"id": "trip", "action": "tripwire", "tool_name": "tripwire"},
            {"id": "count", "action": "counter", "tool_name": "counter"}
        ]}"#;
        let agent = PlanExecuteAgent::new(
            "agent-1",
            Arc::new(ScriptedModel::new([reply])),
            cancelling_registry(&token, &calls),
            EngineSettings::default(),
        )
        .with_cancel_token(token.clone());

        let result = agent.execute_task("trip then count").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
        assert_eq!(result.metadata["status"], json!("cancelled"));
        assert_eq!(result.steps.len(), 1);
        assert_eq!(agent.last_plan().unwrap().status(), PlanStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_failing_pass_prevents_replan() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let reply = r#"{"steps": [
            {"id": "bad", "action": "calculator", "parameters": {"operation": "divide", "a": 1, "b": 0}},
            {"id": "trip", "action": "tripwire", "tool_name": "tripwire"}
        ]}"#;
        let model = Arc::new(ScriptedModel::repeating(reply));
        let agent = PlanExecuteAgent::new(
            "agent-1",
            model.clone(),
            cancelling_registry(&token, &calls),
            EngineSettings::default(),
        )
        .with_cancel_token(token.clone());

        let result = agent.execute_task("divide then trip").await;

        assert_eq!(model.prompts().len(), 1);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
        assert_eq!(result.metadata["status"], json!("cancelled"));
        assert_eq!(result.metadata["replanned_count"], json!(0));
    }

    #[tokio::test]
    async fn test_context_reaches_planner() {
        let model = Arc::new(ScriptedModel::new([ADD]));
        let agent =
            PlanExecuteAgent::new("agent-1", model.clone(), registry(), EngineSettings::default());
        let mut context = Params::new();
        context.insert("precision".to_string(), json!("integer"));

        let result = agent.execute_task_with("add 2 and 3", &context).await;
        assert!(result.success);
        assert!(model.prompts()[0].contains("\"precision\": \"integer\""));
    }

    /// Reports every verdict against a step the plan does not have.
    struct StrayVerifier;

    #[async_trait]
    impl Verifier for StrayVerifier {
        async fn verify(&self, _step: &Step, _result: &StepResult) -> crate::plan::Verification {
            crate::plan::Verification::success("ghost", "looks fine")
        }
    }

    #[tokio::test]
    async fn test_plan_is_kept_when_run_errors() {
        let agent = agent(&[ADD]).with_verifier(Arc::new(StrayVerifier));
        let result = agent.execute_task("add 2 and 3").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Plan error: Unknown step: ghost"));

        let plan = agent.last_plan().unwrap();
        assert_eq!(plan.status(), PlanStatus::Verifying);
        assert_eq!(plan.step_results().len(), 1);
    }

    #[tokio::test]
    async fn test_successful_steps_are_recorded_on_blackboard() {
        let board = Arc::new(Blackboard::new());
        let agent = agent(&[ADD]).with_blackboard(Arc::clone(&board));

        let result = agent.execute_task("add 2 and 3").await;
        let key = format!("{}/step_1", result.metadata["plan_id"].as_str().unwrap());
        let entry = board.get_entry(&key).unwrap();
        assert_eq!(entry.value, json!(5));
        assert_eq!(entry.author, "agent-1");
        assert_eq!(entry.supporting_steps, vec!["step_1"]);
    }
}
