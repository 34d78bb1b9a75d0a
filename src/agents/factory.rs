//! Agent factory - builds engines for goals the registry can serve.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use super::analyzer::{TaskAnalysis, TaskAnalyzer};
use super::engine::PlanExecuteAgent;
use crate::blackboard::Blackboard;
use crate::config::{Config, EngineSettings};
use crate::llm::LanguageModel;
use crate::tools::{ToolMetadata, ToolRegistry};

/// Creates [`PlanExecuteAgent`]s gated on capability coverage.
///
/// A `None` from the `create_*` methods signals a capability gap, not an
/// error: the registry cannot serve what the analysis requires.
pub struct AgentFactory {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    settings: EngineSettings,
    analyzer: TaskAnalyzer,
    blackboard: Option<Arc<Blackboard>>,
}

impl AgentFactory {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        settings: EngineSettings,
    ) -> Self {
        let analyzer = TaskAnalyzer::new(Arc::clone(&model), Arc::clone(&tools))
            .with_llm_timeout(settings.llm_timeout);
        Self {
            model,
            tools,
            settings,
            analyzer,
            blackboard: None,
        }
    }

    /// Factory configured from application config.
    pub fn from_config(
        config: &Config,
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let mut factory = Self::new(model, tools, config.engine_settings());
        factory.analyzer = TaskAnalyzer::new(Arc::clone(&factory.model), Arc::clone(&factory.tools))
            .with_llm_timeout(config.llm_timeout)
            .with_retries(config.analyzer_retries);
        factory
    }

    /// Give every created agent this blackboard.
    pub fn with_blackboard(mut self, blackboard: Arc<Blackboard>) -> Self {
        self.blackboard = Some(blackboard);
        self
    }

    pub fn analyzer(&self) -> &TaskAnalyzer {
        &self.analyzer
    }

    pub async fn analyze(&self, task: &str) -> TaskAnalysis {
        self.analyzer.analyze(task).await
    }

    /// Analyze a goal and build an agent if its requirements are met.
    pub async fn create_agent(&self, task: &str) -> Option<PlanExecuteAgent> {
        let analysis = self.analyze(task).await;
        self.create_agent_for(&analysis)
    }

    /// Build an agent for an existing analysis if its requirements are met.
    pub fn create_agent_for(&self, analysis: &TaskAnalysis) -> Option<PlanExecuteAgent> {
        if !self
            .tools
            .has_all_capabilities(analysis.required_capabilities.as_slice())
        {
            let missing: Vec<&String> = analysis
                .required_capabilities
                .iter()
                .filter(|c| self.tools.find_by_capability(c).is_empty())
                .collect();
            tracing::info!(
                "No agent created for '{}': missing capabilities {:?}",
                analysis.task,
                missing
            );
            return None;
        }

        let id = format!("agent-{}", &Uuid::new_v4().simple().to_string()[..8]);
        tracing::info!(
            "Created agent {} for '{}' (complexity {})",
            id,
            analysis.task,
            analysis.complexity
        );

        let mut agent = PlanExecuteAgent::new(
            id,
            Arc::clone(&self.model),
            Arc::clone(&self.tools),
            self.settings.clone(),
        );
        if let Some(board) = &self.blackboard {
            agent = agent.with_blackboard(Arc::clone(board));
        }
        Some(agent)
    }

    /// Tools providing the analysis' required capabilities, ordered by name.
    pub fn select_tools(&self, analysis: &TaskAnalysis) -> Vec<ToolMetadata> {
        let mut selected = BTreeMap::new();
        for capability in &analysis.required_capabilities {
            for tool in self.tools.find_by_capability(capability) {
                let meta = tool.metadata();
                selected
                    .entry(meta.name.clone())
                    .or_insert_with(|| meta.clone());
            }
        }
        selected.into_values().collect()
    }
}
