//! Collaboration strategies over in-process engines.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map};
use taskmesh::agents::PlanExecuteAgent;
use taskmesh::blackboard::Blackboard;
use taskmesh::collab::{
    AgentMessage, AgentReference, CollaborationCoordinator, CollaborationStrategy, Connection,
    Connector, EndpointKey, LocalConnector, ResponseRouter, TransportError,
};
use taskmesh::config::EngineSettings;
use taskmesh::llm::ScriptedModel;
use taskmesh::tools::{Calculator, ToolRegistry};

const ADD: &str = r#"{"steps": [{"id": "step_1", "description": "add", "action": "calculator",
    "parameters": {"operation": "add", "a": 2, "b": 3}}]}"#;

const CAMERA: &str = r#"{"steps": [{"id": "step_1", "action": "camera", "tool_name": "camera"}]}"#;

/// Serves registered engines and swallows messages for the muted endpoints.
struct LossyConnector {
    local: LocalConnector,
    muted: HashSet<EndpointKey>,
}

struct MutedConnection {
    endpoint: EndpointKey,
}

#[async_trait]
impl Connection for MutedConnection {
    fn endpoint(&self) -> &EndpointKey {
        &self.endpoint
    }

    async fn send(&self, _message: AgentMessage) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl Connector for LossyConnector {
    async fn connect(
        &self,
        agent: &AgentReference,
        router: Arc<ResponseRouter>,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        if self.muted.contains(&agent.key()) {
            return Ok(Arc::new(MutedConnection {
                endpoint: agent.key(),
            }));
        }
        self.local.connect(agent, router).await
    }
}

fn engine(id: &str, reply: &str) -> Arc<PlanExecuteAgent> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Calculator::new()));
    let settings = EngineSettings {
        max_replan_attempts: 0,
        ..EngineSettings::default()
    };
    Arc::new(PlanExecuteAgent::new(
        id,
        Arc::new(ScriptedModel::repeating(reply)),
        Arc::new(registry),
        settings,
    ))
}

/// Three agents on device "phone"; `replies[i]` drives agent i+1, `None` mutes it.
async fn setup(replies: [Option<&str>; 3]) -> (CollaborationCoordinator, Vec<AgentReference>) {
    let local = LocalConnector::new();
    let mut muted = HashSet::new();
    let mut agents = Vec::new();

    for (i, reply) in replies.iter().enumerate() {
        let id = format!("agent-{}", i + 1);
        match reply {
            Some(reply) => agents.push(local.register("phone", engine(&id, reply)).await),
            None => {
                let agent = AgentReference::new("phone", id);
                muted.insert(agent.key());
                agents.push(agent);
            }
        }
    }

    let connector = LossyConnector { local, muted };
    let coordinator = CollaborationCoordinator::new("hub", Arc::new(connector))
        .with_delegation_timeout(Duration::from_secs(30));
    (coordinator, agents)
}

#[tokio::test(start_paused = true)]
async fn parallel_keeps_results_of_agents_that_answered() {
    let (coordinator, agents) = setup([Some(ADD), None, Some(ADD)]).await;

    let result = coordinator
        .execute_collaborative_task("add 2 and 3", &agents, CollaborationStrategy::Parallel)
        .await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("phone:agent-2"), "{}", error);
    assert!(error.contains("timed out"), "{}", error);

    let ids: Vec<&str> = result.steps.iter().map(|s| s.step_id.as_str()).collect();
    assert_eq!(ids, vec!["phone:agent-1/step_1", "phone:agent-3/step_1"]);
    assert_eq!(result.result, Some(json!([5, null, 5])));
    assert_eq!(result.metadata["strategy"], json!("parallel"));
    assert_eq!(coordinator.router().pending_count().await, 0);
}

#[tokio::test]
async fn parallel_succeeds_when_every_agent_does() {
    let (coordinator, agents) = setup([Some(ADD), Some(ADD), Some(ADD)]).await;

    let result = coordinator
        .execute_collaborative_task("add 2 and 3", &agents, CollaborationStrategy::Parallel)
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.steps_completed, 3);
    assert_eq!(result.result, Some(json!([5, 5, 5])));
}

#[tokio::test]
async fn sequential_stops_at_first_failure() {
    let (coordinator, agents) = setup([Some(CAMERA), Some(ADD), Some(ADD)]).await;

    let result = coordinator
        .execute_collaborative_task("take a photo", &agents, CollaborationStrategy::Sequential)
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("phone:agent-1"));
    assert_eq!(result.steps.len(), 1);
    assert!(result.steps[0].step_id.starts_with("phone:agent-1/"));
    assert_eq!(result.steps_failed, 1);

    // The chain never reached the other agents.
    assert!(!coordinator.is_connected(&agents[1].key()).await);
}

#[tokio::test]
async fn sequential_accumulates_every_agent() {
    let (coordinator, agents) = setup([Some(ADD), Some(ADD), Some(ADD)]).await;

    let result = coordinator
        .execute(&agents, "add 2 and 3", Map::new(), CollaborationStrategy::Sequential)
        .await;

    assert!(result.success);
    assert_eq!(result.steps.len(), 3);
    assert_eq!(result.steps[2].step_id, "phone:agent-3/step_1");
}

#[tokio::test]
async fn hierarchical_delegates_to_coordinator_only() {
    let (coordinator, agents) = setup([Some(ADD), Some(CAMERA), Some(CAMERA)]).await;

    let result = coordinator
        .execute_collaborative_task("add 2 and 3", &agents, CollaborationStrategy::Hierarchical)
        .await;

    assert!(result.success);
    assert_eq!(result.result, Some(json!(5)));
    assert_eq!(result.metadata["coordinator"], json!("phone:agent-1"));
    assert_eq!(result.steps[0].step_id, "step_1");
}

#[tokio::test]
async fn local_agents_report_capabilities() {
    let (coordinator, agents) = setup([Some(ADD), None, None]).await;

    let described = coordinator.request_capabilities(&agents[0]).await.unwrap();
    assert_eq!(described.agent_id, "agent-1");
    assert!(described.capabilities.contains(&"math".to_string()));
}

#[tokio::test]
async fn collaboration_outcome_lands_on_blackboard() {
    let board = Arc::new(Blackboard::new());
    let local = LocalConnector::new();
    let a = local.register("phone", engine("agent-1", ADD)).await;
    let b = local.register("tablet", engine("agent-2", CAMERA)).await;
    let coordinator =
        CollaborationCoordinator::new("hub", Arc::new(local)).with_blackboard(Arc::clone(&board));

    let result = coordinator
        .execute_collaborative_task("add 2 and 3", &[a, b], CollaborationStrategy::Parallel)
        .await;
    assert!(!result.success);

    let run_id = result.metadata["collaboration_id"].as_str().unwrap();
    let phone = board.get_entry(&format!("collab/{}/phone:agent-1", run_id)).unwrap();
    assert_eq!(phone.value["success"], true);
    assert_eq!(phone.confidence, 1.0);

    let tablet = board.get_entry(&format!("collab/{}/tablet:agent-2", run_id)).unwrap();
    assert_eq!(tablet.value["success"], false);
    assert_eq!(tablet.confidence, 0.5);

    let total = board.get_entry(&format!("collab/{}/result", run_id)).unwrap();
    assert_eq!(total.author, "hub");

    let delta = board.to_structured(Some(0));
    assert_eq!(delta["facts"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn shared_facts_reach_the_blackboard() {
    let board = Arc::new(Blackboard::new());
    let local = LocalConnector::new();
    let agent = local.register("phone", engine("agent-1", ADD)).await;
    let coordinator =
        CollaborationCoordinator::new("hub", Arc::new(local)).with_blackboard(Arc::clone(&board));

    coordinator.connect(&agent).await.unwrap();
    coordinator
        .send(
            &agent.key(),
            AgentMessage::ResourceShare {
                key: "city".to_string(),
                value: json!("Lyon"),
                author: "phone".to_string(),
                confidence: 0.9,
                source_device_id: "phone".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(board.get("city"), Some(json!("Lyon")));
}

#[tokio::test]
async fn delegated_parameters_reach_the_planner() {
    let model = Arc::new(ScriptedModel::new([ADD]));
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Calculator::new()));
    let engine = Arc::new(PlanExecuteAgent::new(
        "agent-1",
        model.clone(),
        Arc::new(registry),
        EngineSettings::default(),
    ));

    let local = LocalConnector::new();
    let agent = local.register("phone", engine).await;
    let coordinator = CollaborationCoordinator::new("hub", Arc::new(local));

    let mut parameters = Map::new();
    parameters.insert("units".to_string(), json!("metric"));
    let result = coordinator
        .execute(&[agent], "add 2 and 3", parameters, CollaborationStrategy::Sequential)
        .await;

    assert!(result.success, "{:?}", result.error);
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("\"units\": \"metric\""));
}
