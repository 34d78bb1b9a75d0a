//! Task analyzer - estimates what a goal needs before an agent is built.
//!
//! Analyzes a goal and estimates:
//! - Complexity (1-10)
//! - Required capability tags
//! - Whether it should run on a remote agent
//!
//! Parsing is best-effort: strict JSON first, then a permissive pattern
//! extraction, then a conservative default. A failed analysis never fails
//! the caller.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::planner::extract_json;
use crate::llm::{invoke_with_timeout, LanguageModel};
use crate::tools::ToolRegistry;

const DEFAULT_COMPLEXITY: u8 = 5;

/// Requirements estimated for a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub task: String,
    /// Complexity in 1..=10
    pub complexity: u8,
    pub required_capabilities: Vec<String>,
    pub should_run_remotely: bool,
    pub reasoning: String,
}

impl TaskAnalysis {
    /// Conservative analysis: moderate complexity, no requirements, local.
    pub fn conservative(task: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            complexity: DEFAULT_COMPLEXITY,
            required_capabilities: Vec::new(),
            should_run_remotely: false,
            reasoning: reasoning.into(),
        }
    }
}

/// Asks the language model what a goal requires.
pub struct TaskAnalyzer {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    llm_timeout: Duration,
    retries: u32,
}

impl TaskAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            llm_timeout: Duration::from_secs(120),
            retries: 1,
        }
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    /// Quick retries on transient model errors before the default is used.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn build_prompt(&self, task: &str) -> String {
        format!(
            r#"You are a task analyzer. Decide what the following task needs.

Task: {}

Available capabilities: {}

Respond with a JSON object containing:
- "complexity": integer from 1 (trivial) to 10 (very complex)
- "requiredCapabilities": array of capabilities from the list above
- "shouldRunRemotely": true if a more powerful remote agent should run it
- "reasoning": brief explanation

Respond with ONLY the JSON object, no other text."#,
            task,
            self.tools.capabilities().join(", ")
        )
    }

    /// Analyze a goal.
    ///
    /// # Postconditions
    /// - Never fails; model errors yield [`TaskAnalysis::conservative`]
    /// - `1 <= complexity <= 10`
    pub async fn analyze(&self, task: &str) -> TaskAnalysis {
        let prompt = self.build_prompt(task);
        let mut attempt = 0;

        loop {
            match invoke_with_timeout(self.model.as_ref(), &prompt, self.llm_timeout).await {
                Ok(response) => {
                    let analysis = Self::parse_response(task, &response);
                    tracing::info!(
                        "Task analysis: complexity {}, capabilities {:?}, remote {}",
                        analysis.complexity,
                        analysis.required_capabilities,
                        analysis.should_run_remotely
                    );
                    return analysis;
                }
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!("Task analysis failed ({}), retrying", e);
                }
                Err(e) => {
                    tracing::warn!("Task analysis failed, using conservative default: {}", e);
                    return TaskAnalysis::conservative(
                        task,
                        format!("LLM error, using fallback: {}", e),
                    );
                }
            }
        }
    }

    /// Parse a model reply.
    ///
    /// Accepts camelCase or snake_case keys. Falls back to pattern
    /// extraction when the reply is not JSON.
    pub fn parse_response(task: &str, response: &str) -> TaskAnalysis {
        match extract_json(response) {
            Some(Value::Object(json)) => {
                let field = |camel: &str, snake: &str| json.get(camel).or_else(|| json.get(snake));

                let complexity = field("complexity", "complexity")
                    .and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
                    .map(clamp_complexity)
                    .unwrap_or(DEFAULT_COMPLEXITY);

                let required_capabilities = field("requiredCapabilities", "required_capabilities")
                    .and_then(Value::as_array)
                    .map(|caps| {
                        caps.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();

                let should_run_remotely = field("shouldRunRemotely", "should_run_remotely")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

                let reasoning = field("reasoning", "reasoning")
                    .and_then(Value::as_str)
                    .unwrap_or("No reasoning provided")
                    .to_string();

                TaskAnalysis {
                    task: task.to_string(),
                    complexity,
                    required_capabilities,
                    should_run_remotely,
                    reasoning,
                }
            }
            _ => Self::extract_partial(task, response),
        }
    }

    /// Pattern extraction for replies that are almost, but not quite, JSON.
    fn extract_partial(task: &str, response: &str) -> TaskAnalysis {
        let mut analysis =
            TaskAnalysis::conservative(task, "Partial extraction from unstructured response");

        if let Some(caps) = capture(r#"(?i)"?complexity"?\s*[:=]\s*(\d+)"#, response) {
            if let Ok(n) = caps.parse::<f64>() {
                analysis.complexity = clamp_complexity(n);
            }
        }

        analysis.should_run_remotely = Regex::new(r#"(?i)"?should_?run_?remotely"?\s*[:=]\s*true"#)
            .map(|re| re.is_match(response))
            .unwrap_or(false);

        if let Some(list) = capture(
            r#"(?i)"?required_?capabilities"?\s*[:=]\s*\[([^\]]*)\]"#,
            response,
        ) {
            analysis.required_capabilities = list
                .split(',')
                .map(|c| c.trim().trim_matches(|ch| ch == '"' || ch == '\'').trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }

        analysis
    }
}

fn capture(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)?.get(1).map(|m| m.as_str().to_string())
}

fn clamp_complexity(n: f64) -> u8 {
    if n.is_nan() {
        return DEFAULT_COMPLEXITY;
    }
    n.round().clamp(1.0, 10.0) as u8
}
