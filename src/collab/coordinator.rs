//! Multi-agent collaboration coordinator.
//!
//! Spreads one task over a list of agents according to a
//! [`CollaborationStrategy`]. Every delegation is a request/response exchange
//! correlated by task id and bounded by the delegation timeout; an agent that
//! does not answer in time counts as a failed contribution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::message::AgentMessage;
use super::router::ResponseRouter;
use super::transport::{Connection, Connector, TransportError};
use super::types::{AgentReference, CollaborationStrategy, EndpointKey};
use crate::agents::AgentResult;
use crate::blackboard::Blackboard;
use crate::config::Config;
use crate::plan::StepResult;

#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("Not connected to {0}")]
    NotConnected(String),

    #[error("Delegation to {agent} timed out after {seconds}s")]
    Timeout { agent: String, seconds: u64 },

    #[error("Delegation to {agent} failed: {reason}")]
    Failed { agent: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Response channel closed for {0}")]
    ChannelClosed(String),
}

/// One agent's share of a collaborative run.
struct Contribution {
    agent: AgentReference,
    result: AgentResult,
}

impl Contribution {
    /// Step results tagged with the contributing endpoint.
    fn tagged_steps(&self) -> Vec<StepResult> {
        let prefix = self.agent.key();
        self.result
            .steps
            .iter()
            .cloned()
            .map(|mut step| {
                step.step_id = format!("{}/{}", prefix, step.step_id);
                step
            })
            .collect()
    }
}

pub struct CollaborationCoordinator {
    device_id: String,
    connector: Arc<dyn Connector>,
    router: Arc<ResponseRouter>,
    connections: RwLock<HashMap<EndpointKey, Arc<dyn Connection>>>,
    groups: RwLock<HashMap<String, Vec<AgentReference>>>,
    blackboard: Option<Arc<Blackboard>>,
    delegation_timeout: Duration,
}

impl CollaborationCoordinator {
    pub fn new(device_id: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            device_id: device_id.into(),
            connector,
            router: Arc::new(ResponseRouter::new(None)),
            connections: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
            blackboard: None,
            delegation_timeout: Duration::from_secs(300),
        }
    }

    /// Coordinator for this device using the configured delegation timeout.
    pub fn from_config(config: &Config, connector: Arc<dyn Connector>) -> Self {
        Self::new(config.device_id.clone(), connector)
            .with_delegation_timeout(config.delegation_timeout)
    }

    /// Record run outcomes and accept shared facts on this board.
    ///
    /// Must be called before any connection is opened.
    pub fn with_blackboard(mut self, blackboard: Arc<Blackboard>) -> Self {
        self.router = Arc::new(ResponseRouter::new(Some(Arc::clone(&blackboard))));
        self.blackboard = Some(blackboard);
        self
    }

    pub fn with_delegation_timeout(mut self, timeout: Duration) -> Self {
        self.delegation_timeout = timeout;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn router(&self) -> &Arc<ResponseRouter> {
        &self.router
    }

    pub async fn is_connected(&self, key: &EndpointKey) -> bool {
        self.connections.read().await.contains_key(key)
    }

    /// Open a connection to `agent` unless one exists already.
    pub async fn connect(&self, agent: &AgentReference) -> Result<(), DelegationError> {
        let key = agent.key();
        if self.is_connected(&key).await {
            tracing::debug!("Reusing connection to {}", key);
            return Ok(());
        }

        let connection = self
            .connector
            .connect(agent, Arc::clone(&self.router))
            .await?;

        let mut connections = self.connections.write().await;
        if connections.contains_key(&key) {
            tracing::debug!("Connection to {} raced; keeping the existing one", key);
        } else {
            tracing::info!("Connected to {}", key);
            connections.insert(key, connection);
        }
        Ok(())
    }

    /// Send a message over an established connection.
    pub async fn send(&self, key: &EndpointKey, message: AgentMessage) -> Result<(), DelegationError> {
        let connection = self
            .connections
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| DelegationError::NotConnected(key.to_string()))?;

        if let Err(e) = connection.send(message).await {
            // A dead connection is dropped so the next exchange reconnects.
            tracing::warn!("Dropping connection to {}: {}", key, e);
            self.evict(key, &connection).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Close the connection to an endpoint. Returns false if none was open.
    pub async fn disconnect(&self, key: &EndpointKey) -> bool {
        let removed = self.connections.write().await.remove(key).is_some();
        if removed {
            tracing::info!("Disconnected from {}", key);
        }
        removed
    }

    /// Remove `connection` unless it was already replaced by a newer one.
    async fn evict(&self, key: &EndpointKey, connection: &Arc<dyn Connection>) {
        let mut connections = self.connections.write().await;
        if connections
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, connection))
        {
            connections.remove(key);
        }
    }

    /// Ask an agent to describe itself.
    pub async fn request_capabilities(
        &self,
        agent: &AgentReference,
    ) -> Result<AgentReference, DelegationError> {
        self.connect(agent).await?;

        let request_id = Uuid::new_v4().to_string();
        let message = AgentMessage::CapabilitiesRequest {
            request_id: request_id.clone(),
            agent_id: agent.agent_id.clone(),
            source_device_id: self.device_id.clone(),
        };

        match self.exchange(agent, request_id, message).await? {
            AgentMessage::CapabilitiesResponse { agent, .. } => Ok(agent),
            other => Err(DelegationError::Failed {
                agent: agent.to_string(),
                reason: format!("unexpected {} response", other.kind()),
            }),
        }
    }

    /// Delegate a task to one agent and wait for its result.
    ///
    /// A remote `success: false` is returned as `Ok`; errors describe
    /// transport or protocol problems only.
    pub async fn delegate(
        &self,
        agent: &AgentReference,
        task: &str,
        parameters: Map<String, Value>,
    ) -> Result<AgentResult, DelegationError> {
        self.connect(agent).await?;

        let task_id = Uuid::new_v4().to_string();
        let message = AgentMessage::TaskDelegation {
            task_id: task_id.clone(),
            agent_id: agent.agent_id.clone(),
            task: task.to_string(),
            parameters,
            timeout: self.delegation_timeout.as_secs(),
            source_device_id: self.device_id.clone(),
            timestamp: Utc::now(),
        };

        tracing::info!("Delegating task {} to {}", task_id, agent);
        match self.exchange(agent, task_id.clone(), message).await? {
            AgentMessage::TaskResponse { result, .. } => {
                tracing::info!(
                    "Task {} answered by {} (success: {})",
                    task_id,
                    agent,
                    result.success
                );
                Ok(result)
            }
            other => Err(DelegationError::Failed {
                agent: agent.to_string(),
                reason: format!("unexpected {} response", other.kind()),
            }),
        }
    }

    /// Send a correlated request and await its response.
    async fn exchange(
        &self,
        agent: &AgentReference,
        correlation_id: String,
        message: AgentMessage,
    ) -> Result<AgentMessage, DelegationError> {
        let rx = self.router.register(correlation_id.clone()).await;

        if let Err(e) = self.send(&agent.key(), message).await {
            self.router.cancel(&correlation_id).await;
            return Err(e);
        }

        match tokio::time::timeout(self.delegation_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(DelegationError::ChannelClosed(agent.to_string())),
            Err(_) => {
                self.router.cancel(&correlation_id).await;
                tracing::warn!(
                    "{} did not answer {} within {:?}",
                    agent,
                    correlation_id,
                    self.delegation_timeout
                );
                Err(DelegationError::Timeout {
                    agent: agent.to_string(),
                    seconds: self.delegation_timeout.as_secs(),
                })
            }
        }
    }

    /// Delegate, folding delegation errors into a failed result.
    async fn contribute(
        &self,
        agent: &AgentReference,
        task: &str,
        parameters: Map<String, Value>,
    ) -> Contribution {
        let result = match self.delegate(agent, task, parameters).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Contribution from {} failed: {}", agent, e);
                AgentResult::failure(e.to_string())
            }
        };
        Contribution {
            agent: agent.clone(),
            result,
        }
    }

    /// Connect every member and remember the group.
    pub async fn create_group(
        &self,
        group_id: impl Into<String>,
        agents: Vec<AgentReference>,
    ) -> Result<(), DelegationError> {
        let group_id = group_id.into();
        for agent in &agents {
            self.connect(agent).await?;
        }

        for agent in &agents {
            let announce = AgentMessage::GroupCreation {
                group_id: group_id.clone(),
                members: agents.clone(),
                source_device_id: self.device_id.clone(),
            };
            if let Err(e) = self.send(&agent.key(), announce).await {
                tracing::warn!("Could not announce group {} to {}: {}", group_id, agent, e);
            }
        }

        tracing::info!("Group {} ready with {} members", group_id, agents.len());
        self.groups.write().await.insert(group_id, agents);
        Ok(())
    }

    pub async fn group(&self, group_id: &str) -> Option<Vec<AgentReference>> {
        self.groups.read().await.get(group_id).cloned()
    }

    /// Run a task across a previously created group.
    pub async fn execute_group(
        &self,
        group_id: &str,
        task: &str,
        parameters: Map<String, Value>,
        strategy: CollaborationStrategy,
    ) -> AgentResult {
        match self.group(group_id).await {
            Some(agents) => self.execute(&agents, task, parameters, strategy).await,
            None => AgentResult::failure(format!("unknown group: {}", group_id)),
        }
    }

    /// Run a goal across agents without extra parameters.
    pub async fn execute_collaborative_task(
        &self,
        goal: &str,
        agents: &[AgentReference],
        strategy: CollaborationStrategy,
    ) -> AgentResult {
        self.execute(agents, goal, Map::new(), strategy).await
    }

    /// Run a task across agents with the given strategy.
    pub async fn execute(
        &self,
        agents: &[AgentReference],
        task: &str,
        parameters: Map<String, Value>,
        strategy: CollaborationStrategy,
    ) -> AgentResult {
        if agents.is_empty() {
            return AgentResult::failure("no agents");
        }

        let run_id = Uuid::new_v4().to_string();
        tracing::info!(
            "Collaboration {} ({}) across {} agents",
            run_id,
            strategy,
            agents.len()
        );

        let (result, contributions) = match strategy {
            CollaborationStrategy::Sequential => {
                self.run_sequential(agents, task, parameters).await
            }
            CollaborationStrategy::Parallel => self.run_parallel(agents, task, parameters).await,
            CollaborationStrategy::Hierarchical => {
                self.run_hierarchical(agents, task, parameters).await
            }
        };

        let result = if strategy == CollaborationStrategy::Hierarchical {
            result
        } else {
            let members: Vec<Value> = agents.iter().map(|a| json!(a.to_string())).collect();
            result
                .with_metadata("collaboration_id", json!(run_id))
                .with_metadata("strategy", json!(strategy.to_string()))
                .with_metadata("agents", Value::Array(members))
        };

        self.record(&run_id, &contributions, &result);
        tracing::info!(
            "Collaboration {} finished (success: {})",
            run_id,
            result.success
        );
        result
    }

    async fn run_sequential(
        &self,
        agents: &[AgentReference],
        task: &str,
        parameters: Map<String, Value>,
    ) -> (AgentResult, Vec<Contribution>) {
        let mut contributions: Vec<Contribution> = Vec::new();

        for agent in agents {
            let contribution = self.contribute(agent, task, parameters.clone()).await;
            let failed = !contribution.result.success;
            contributions.push(contribution);

            if failed {
                let error = contributions
                    .last()
                    .map(describe_failure)
                    .unwrap_or_default();
                tracing::warn!("Sequential run stopped: {}", error);
                let steps = collect_steps(&contributions);
                return (AgentResult::failure(error).with_steps(steps), contributions);
            }
        }

        let payloads = collect_payloads(&contributions);
        let steps = collect_steps(&contributions);
        (
            AgentResult::success(payloads).with_steps(steps),
            contributions,
        )
    }

    async fn run_parallel(
        &self,
        agents: &[AgentReference],
        task: &str,
        parameters: Map<String, Value>,
    ) -> (AgentResult, Vec<Contribution>) {
        let futures = agents
            .iter()
            .map(|agent| self.contribute(agent, task, parameters.clone()));
        let contributions = join_all(futures).await;

        let steps = collect_steps(&contributions);
        let payloads = collect_payloads(&contributions);
        let failures: Vec<String> = contributions
            .iter()
            .filter(|c| !c.result.success)
            .map(describe_failure)
            .collect();

        let result = if failures.is_empty() {
            AgentResult::success(payloads)
        } else {
            AgentResult::failure(failures.join("; ")).with_result(payloads)
        };
        (result.with_steps(steps), contributions)
    }

    async fn run_hierarchical(
        &self,
        agents: &[AgentReference],
        task: &str,
        parameters: Map<String, Value>,
    ) -> (AgentResult, Vec<Contribution>) {
        let coordinator = &agents[0];
        let contribution = self.contribute(coordinator, task, parameters).await;
        let result = contribution
            .result
            .clone()
            .with_metadata("coordinator", json!(coordinator.to_string()));
        (result, vec![contribution])
    }

    fn record(&self, run_id: &str, contributions: &[Contribution], result: &AgentResult) {
        let Some(board) = &self.blackboard else {
            return;
        };

        for contribution in contributions {
            board.put_with(
                format!("collab/{}/{}", run_id, contribution.agent.key()),
                summarize(&contribution.result),
                self.device_id.as_str(),
                confidence_for(&contribution.result),
                Vec::new(),
            );
        }
        board.put_with(
            format!("collab/{}/result", run_id),
            summarize(result),
            self.device_id.as_str(),
            confidence_for(result),
            Vec::new(),
        );
    }
}

fn describe_failure(contribution: &Contribution) -> String {
    format!(
        "{}: {}",
        contribution.agent,
        contribution
            .result
            .error
            .as_deref()
            .unwrap_or("failed without error")
    )
}

fn collect_steps(contributions: &[Contribution]) -> Vec<StepResult> {
    contributions.iter().flat_map(Contribution::tagged_steps).collect()
}

fn collect_payloads(contributions: &[Contribution]) -> Value {
    Value::Array(
        contributions
            .iter()
            .map(|c| c.result.result.clone().unwrap_or(Value::Null))
            .collect(),
    )
}

fn summarize(result: &AgentResult) -> Value {
    json!({
        "success": result.success,
        "result": result.result,
        "error": result.error,
        "steps_completed": result.steps_completed,
        "steps_failed": result.steps_failed,
    })
}

fn confidence_for(result: &AgentResult) -> f64 {
    if result.success {
        1.0
    } else {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Answers every delegation with a canned result after recording it.
    struct EchoConnector {
        answers: HashMap<String, AgentResult>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    struct EchoConnection {
        endpoint: EndpointKey,
        answer: Option<AgentResult>,
        router: Arc<ResponseRouter>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Connector for EchoConnector {
        async fn connect(
            &self,
            agent: &AgentReference,
            router: Arc<ResponseRouter>,
        ) -> Result<Arc<dyn Connection>, TransportError> {
            Ok(Arc::new(EchoConnection {
                endpoint: agent.key(),
                answer: self.answers.get(&agent.agent_id).cloned(),
                router,
                sent: Arc::clone(&self.sent),
            }))
        }
    }

    #[async_trait]
    impl Connection for EchoConnection {
        fn endpoint(&self) -> &EndpointKey {
            &self.endpoint
        }

        async fn send(&self, message: AgentMessage) -> Result<(), TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.endpoint.agent_id, message.kind()));
            if let AgentMessage::TaskDelegation { task_id, .. } = message {
                if let Some(result) = self.answer.clone() {
                    self.router
                        .dispatch(AgentMessage::TaskResponse {
                            task_id,
                            result,
                            source_device_id: self.endpoint.device_id.clone(),
                            timestamp: Utc::now(),
                        })
                        .await;
                }
            }
            Ok(())
        }
    }

    fn hub(answers: Vec<(&str, AgentResult)>) -> (CollaborationCoordinator, Arc<StdMutex<Vec<String>>>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let connector = EchoConnector {
            answers: answers
                .into_iter()
                .map(|(id, r)| (id.to_string(), r))
                .collect(),
            sent: Arc::clone(&sent),
        };
        let coordinator = CollaborationCoordinator::new("hub", Arc::new(connector))
            .with_delegation_timeout(Duration::from_secs(5));
        (coordinator, sent)
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (coordinator, _) = hub(vec![]);
        let agent = AgentReference::new("tablet", "worker");

        coordinator.connect(&agent).await.unwrap();
        coordinator.connect(&agent).await.unwrap();

        assert!(coordinator.is_connected(&agent.key()).await);
        assert_eq!(coordinator.connections.read().await.len(), 1);
    }

    /// Hands out connections whose sends always fail.
    struct BrokenConnector {
        connects: AtomicUsize,
    }

    struct BrokenConnection {
        endpoint: EndpointKey,
    }

    #[async_trait]
    impl Connector for BrokenConnector {
        async fn connect(
            &self,
            agent: &AgentReference,
            _router: Arc<ResponseRouter>,
        ) -> Result<Arc<dyn Connection>, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(BrokenConnection {
                endpoint: agent.key(),
            }))
        }
    }

    #[async_trait]
    impl Connection for BrokenConnection {
        fn endpoint(&self) -> &EndpointKey {
            &self.endpoint
        }

        async fn send(&self, _message: AgentMessage) -> Result<(), TransportError> {
            Err(TransportError::Closed(self.endpoint.to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_send_drops_connection() {
        let connector = Arc::new(BrokenConnector {
            connects: AtomicUsize::new(0),
        });
        let coordinator = CollaborationCoordinator::new("hub", connector.clone());
        let agent = AgentReference::new("tablet", "worker");

        for _ in 0..2 {
            let err = coordinator
                .delegate(&agent, "do it", Map::new())
                .await
                .unwrap_err();
            assert!(matches!(err, DelegationError::Transport(TransportError::Closed(_))));
            assert!(!coordinator.is_connected(&agent.key()).await);
        }

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.router().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (coordinator, _) = hub(vec![]);
        let agent = AgentReference::new("tablet", "worker");

        coordinator.connect(&agent).await.unwrap();
        assert!(coordinator.disconnect(&agent.key()).await);
        assert!(!coordinator.is_connected(&agent.key()).await);
        assert!(!coordinator.disconnect(&agent.key()).await);
    }

    #[tokio::test]
    async fn test_remote_failure_is_returned_not_raised() {
        let (coordinator, _) = hub(vec![("worker", AgentResult::failure("no tool"))]);
        let agent = AgentReference::new("tablet", "worker");

        let result = coordinator.delegate(&agent, "do it", Map::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no tool"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_agent_times_out() {
        let (coordinator, _) = hub(vec![]);
        let agent = AgentReference::new("tablet", "mute");

        let err = coordinator
            .delegate(&agent, "do it", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DelegationError::Timeout { seconds: 5, .. }));
        assert_eq!(coordinator.router().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_send_without_connection() {
        let (coordinator, _) = hub(vec![]);
        let key = EndpointKey::new("tablet", "worker");
        let err = coordinator
            .send(&key, AgentMessage::Heartbeat {
                source_device_id: "hub".to_string(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DelegationError::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_empty_agent_list() {
        let (coordinator, _) = hub(vec![]);
        let result = coordinator
            .execute_collaborative_task("anything", &[], CollaborationStrategy::Parallel)
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no agents"));
    }

    #[tokio::test]
    async fn test_groups_are_announced_and_resolved() {
        let (coordinator, sent) = hub(vec![("a", AgentResult::success(json!(1)))]);
        let members = vec![AgentReference::new("d1", "a")];

        coordinator.create_group("team", members).await.unwrap();
        assert!(sent.lock().unwrap().contains(&"a:group_creation".to_string()));

        let result = coordinator
            .execute_group("team", "task", Map::new(), CollaborationStrategy::Sequential)
            .await;
        assert!(result.success);
        assert_eq!(result.result, Some(json!([1])));

        let missing = coordinator
            .execute_group("ghosts", "task", Map::new(), CollaborationStrategy::Sequential)
            .await;
        assert_eq!(missing.error.as_deref(), Some("unknown group: ghosts"));
    }

    #[tokio::test]
    async fn test_outcomes_recorded_on_blackboard() {
        let board = Arc::new(Blackboard::new());
        let (coordinator, _) = hub(vec![
            ("a", AgentResult::success(json!("ok"))),
            ("b", AgentResult::failure("broken")),
        ]);
        let coordinator = coordinator.with_blackboard(Arc::clone(&board));
        let agents = vec![AgentReference::new("d1", "a"), AgentReference::new("d2", "b")];

        let result = coordinator
            .execute(&agents, "task", Map::new(), CollaborationStrategy::Parallel)
            .await;
        assert!(!result.success);

        let run_id = result.metadata["collaboration_id"].as_str().unwrap().to_string();
        let a = board.get_entry(&format!("collab/{}/d1:a", run_id)).unwrap();
        assert_eq!(a.confidence, 1.0);
        assert_eq!(a.author, "hub");
        let total = board.get_entry(&format!("collab/{}/result", run_id)).unwrap();
        assert_eq!(total.confidence, 0.5);
        assert_eq!(total.value["success"], false);
    }
}
