//! Planner - turns a goal into steps via the language model.
//!
//! Model output is untyped text. It is parsed defensively into a strict
//! step schema with explicit defaults; anything unusable degrades to a
//! single-step fallback plan, reported as [`PlanDraft::Fallback`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::llm::{invoke_with_timeout, LanguageModel};
use crate::plan::{Plan, Step};
use crate::tools::{Params, ToolRegistry};

/// Outcome of a planning call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanDraft {
    /// Steps parsed from the model's structured output
    Parsed(Vec<Step>),
    /// Single-step plan used because the output was unusable
    Fallback { steps: Vec<Step>, reason: String },
}

impl PlanDraft {
    pub fn steps(&self) -> &[Step] {
        match self {
            PlanDraft::Parsed(steps) | PlanDraft::Fallback { steps, .. } => steps,
        }
    }

    pub fn into_steps(self) -> Vec<Step> {
        match self {
            PlanDraft::Parsed(steps) | PlanDraft::Fallback { steps, .. } => steps,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PlanDraft::Fallback { .. })
    }
}

/// Step as the model may write it. Every field but the action is optional.
#[derive(Debug, Deserialize)]
struct StepSpec {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default, alias = "params", alias = "arguments")]
    parameters: Option<Params>,
    #[serde(default, alias = "tools")]
    required_tools: Vec<String>,
    #[serde(default, alias = "estimated_duration")]
    estimated_duration_secs: Option<u64>,
    #[serde(default, alias = "depends_on", deserialize_with = "lenient_list")]
    dependencies: Vec<String>,
    #[serde(default, alias = "tool")]
    tool_name: Option<String>,
}

/// Accept `"step_1"` or `1` as an identifier.
fn lenient_string<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_list<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => vec![s],
        _ => Vec::new(),
    })
}

/// Builds planning prompts and parses the replies.
pub struct Planner {
    model: Arc<dyn LanguageModel>,
    llm_timeout: Duration,
}

impl Planner {
    pub fn new(model: Arc<dyn LanguageModel>, llm_timeout: Duration) -> Self {
        Self { model, llm_timeout }
    }

    /// Prompt for an initial plan.
    ///
    /// `context` carries caller-supplied parameters (delegated task
    /// parameters, for instance); it is omitted from the prompt when empty.
    pub fn plan_prompt(goal: &str, context: &Params, tools: &ToolRegistry) -> String {
        format!(
            r#"You are a task planner. Break the goal into steps that can each be executed by one tool.

Goal: {}
{}
Available tools:
{}

Respond with a JSON object:
{{
    "steps": [
        {{
            "id": "step_1",
            "description": "What this step does",
            "action": "tool name or short action",
            "tool_name": "exact tool name",
            "parameters": {{}},
            "required_tools": ["tool name"],
            "dependencies": []
        }}
    ]
}}

Respond ONLY with the JSON object."#,
            goal,
            context_section(context),
            tools.describe_for_prompt()
        )
    }

    /// Prompt for a replacement plan after a failed verification pass.
    pub fn replan_prompt(previous: &Plan, context: &Params, tools: &ToolRegistry) -> String {
        let prior_steps = previous
            .steps()
            .iter()
            .map(|s| format!("- {}: {}", s.id, s.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are a task planner. A previous plan for this goal failed verification.

Goal: {}
{}
Previous steps:
{}

Failures:
{}

Available tools:
{}

Produce a new plan that avoids these failures, using the same JSON format:
{{"steps": [{{"id": "...", "description": "...", "action": "...", "tool_name": "...", "parameters": {{}}, "dependencies": []}}]}}

Respond ONLY with the JSON object."#,
            previous.goal(),
            context_section(context),
            prior_steps,
            previous.failure_summary(),
            tools.describe_for_prompt()
        )
    }

    /// Ask the model for an initial plan.
    pub async fn plan(&self, goal: &str, context: &Params, tools: &ToolRegistry) -> PlanDraft {
        let prompt = Self::plan_prompt(goal, context, tools);
        self.request(goal, &prompt).await
    }

    /// Ask the model for a replacement plan.
    pub async fn replan(&self, previous: &Plan, context: &Params, tools: &ToolRegistry) -> PlanDraft {
        let prompt = Self::replan_prompt(previous, context, tools);
        self.request(previous.goal(), &prompt).await
    }

    async fn request(&self, goal: &str, prompt: &str) -> PlanDraft {
        let draft = match invoke_with_timeout(self.model.as_ref(), prompt, self.llm_timeout).await {
            Ok(response) => Self::parse(&response, goal),
            Err(e) => Self::fallback(goal, format!("LLM error: {}", e)),
        };

        if let PlanDraft::Fallback { reason, .. } = &draft {
            tracing::warn!("Using single-step fallback plan: {}", reason);
        }
        draft
    }

    /// Parse a model reply into steps.
    ///
    /// # Postconditions
    /// - Never fails: unusable output yields `PlanDraft::Fallback`
    /// - Returned steps are non-empty with unique ids
    pub fn parse(response: &str, goal: &str) -> PlanDraft {
        let Some(json) = extract_json(response) else {
            return Self::fallback(goal, "no JSON found in planner output");
        };

        let items = match json {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("steps") {
                Some(Value::Array(items)) => items,
                _ => return Self::fallback(goal, "planner output has no \"steps\" array"),
            },
            _ => return Self::fallback(goal, "planner output is not an object"),
        };

        let mut steps = Vec::with_capacity(items.len());
        let mut seen = HashSet::new();

        for (i, item) in items.into_iter().enumerate() {
            let spec: StepSpec = match serde_json::from_value(item) {
                Ok(spec) => spec,
                Err(e) => return Self::fallback(goal, format!("step {} is malformed: {}", i + 1, e)),
            };

            let action = spec
                .action
                .filter(|a| !a.trim().is_empty())
                .or_else(|| spec.tool_name.clone())
                .unwrap_or_default();
            if action.is_empty() {
                return Self::fallback(goal, format!("step {} has no action", i + 1));
            }

            let mut id = spec
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("step_{}", i + 1));
            if seen.contains(&id) {
                let base = id;
                let mut suffix = i + 1;
                id = format!("{}_{}", base, suffix);
                while seen.contains(&id) {
                    suffix += 1;
                    id = format!("{}_{}", base, suffix);
                }
            }
            seen.insert(id.clone());

            steps.push(Step {
                description: spec.description.unwrap_or_else(|| action.clone()),
                id,
                action,
                parameters: spec.parameters.unwrap_or_default(),
                required_tools: spec.required_tools,
                estimated_duration_secs: spec.estimated_duration_secs,
                dependencies: spec.dependencies,
                tool_name: spec.tool_name.filter(|t| !t.trim().is_empty()),
            });
        }

        if steps.is_empty() {
            return Self::fallback(goal, "planner returned no steps");
        }
        PlanDraft::Parsed(steps)
    }

    /// Single step carrying the goal as its action.
    pub fn fallback(goal: &str, reason: impl Into<String>) -> PlanDraft {
        let mut parameters = Params::new();
        parameters.insert("goal".to_string(), Value::String(goal.to_string()));

        PlanDraft::Fallback {
            steps: vec![Step::new("step_1", goal, goal).with_parameters(parameters)],
            reason: reason.into(),
        }
    }
}

/// Blank line, or a `Context:` block listing the parameters as JSON.
fn context_section(context: &Params) -> String {
    if context.is_empty() {
        return "\n".to_string();
    }
    let rendered = serde_json::to_string_pretty(context).unwrap_or_default();
    format!("\nContext:\n{}\n\n", rendered)
}

/// Find a JSON value in model output: the whole text, a fenced block, or the
/// span from the first `{` to the last `}`.
pub(crate) fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let body = &trimmed[start + 3..];
        // Skip a language tag such as ```json
        let body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or(body);
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str(body[..end].trim()) {
                return Some(value);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
