//! taskmesh - command line entry point
//!
//! Runs one goal through the plan-execute-verify-replan engine. The operator
//! answers the model prompts on the console.
//!
//! ```text
//! taskmesh [--analyze] <goal...>
//! ```
//!
//! With `--analyze`, the goal is first checked against the registered
//! capabilities and no agent is created when they are not covered.

use std::sync::Arc;

use taskmesh::{
    agents::{AgentError, AgentFactory},
    blackboard::Blackboard,
    config::Config,
    llm::{ConsoleModel, LanguageModel},
    tools::{BlackboardRecall, BlackboardStore, ToolRegistry},
    AgentResult, PlanExecuteAgent,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("taskmesh={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut analyze = false;
    let mut words = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--analyze" => analyze = true,
            _ => words.push(arg),
        }
    }
    let goal = words.join(" ");
    if goal.trim().is_empty() {
        anyhow::bail!("usage: taskmesh [--analyze] <goal...>");
    }

    info!(
        "Loaded configuration: workspace={}, max_replans={}, device={}",
        config.workspace_path.display(),
        config.max_replan_attempts,
        config.device_id
    );

    let blackboard = Arc::new(Blackboard::new());
    let mut registry = ToolRegistry::with_builtins(&config.workspace_path);
    registry.register(Arc::new(BlackboardStore::new(Arc::clone(&blackboard))));
    registry.register(Arc::new(BlackboardRecall::new(Arc::clone(&blackboard))));
    let tools = Arc::new(registry);

    let model: Arc<dyn LanguageModel> = Arc::new(ConsoleModel::new());

    let result = if analyze {
        let factory = AgentFactory::from_config(&config, model, Arc::clone(&tools))
            .with_blackboard(Arc::clone(&blackboard));
        match factory.create_agent(&goal).await {
            Some(agent) => agent.execute_task(&goal).await,
            None => {
                warn!("No agent can serve this goal with the registered tools");
                AgentResult::failure(AgentError::NoCapableAgent.to_string())
            }
        }
    } else {
        PlanExecuteAgent::new(format!("{}-agent", config.device_id), model, tools, config.engine_settings())
            .with_blackboard(Arc::clone(&blackboard))
            .execute_task(&goal)
            .await
    };

    if !blackboard.is_empty() {
        info!("Blackboard:\n{}", blackboard.to_table(None));
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
