//! In-process transport.
//!
//! Delivers delegations to engines living in the same process. Useful for
//! single-device groups and for exercising the coordinator without a network.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::message::AgentMessage;
use super::router::ResponseRouter;
use super::transport::{Connection, Connector, TransportError};
use super::types::{AgentReference, EndpointKey};
use crate::agents::PlanExecuteAgent;

/// Connector over a table of local engines.
#[derive(Default)]
pub struct LocalConnector {
    agents: RwLock<HashMap<EndpointKey, Arc<PlanExecuteAgent>>>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose an engine at `device_id:<agent id>`. Returns its reference.
    pub async fn register(&self, device_id: &str, agent: Arc<PlanExecuteAgent>) -> AgentReference {
        let reference =
            AgentReference::new(device_id, agent.id()).with_capabilities(agent.capabilities());
        self.agents.write().await.insert(reference.key(), agent);
        reference
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(
        &self,
        agent: &AgentReference,
        router: Arc<ResponseRouter>,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        let key = agent.key();
        let engine = self
            .agents
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable(key.to_string()))?;

        Ok(Arc::new(LocalConnection {
            endpoint: key,
            engine,
            router,
        }))
    }
}

struct LocalConnection {
    endpoint: EndpointKey,
    engine: Arc<PlanExecuteAgent>,
    router: Arc<ResponseRouter>,
}

#[async_trait]
impl Connection for LocalConnection {
    fn endpoint(&self) -> &EndpointKey {
        &self.endpoint
    }

    async fn send(&self, message: AgentMessage) -> Result<(), TransportError> {
        match message {
            AgentMessage::TaskDelegation {
                task_id,
                task,
                parameters,
                ..
            } => {
                let engine = Arc::clone(&self.engine);
                let router = Arc::clone(&self.router);
                let device_id = self.endpoint.device_id.clone();

                tokio::spawn(async move {
                    let result = engine.execute_task_with(&task, &parameters).await;
                    router
                        .dispatch(AgentMessage::TaskResponse {
                            task_id,
                            result,
                            source_device_id: device_id,
                            timestamp: Utc::now(),
                        })
                        .await;
                });
                Ok(())
            }
            AgentMessage::CapabilitiesRequest { request_id, .. } => {
                let agent = AgentReference::new(&self.endpoint.device_id, self.engine.id())
                    .with_capabilities(self.engine.capabilities());
                self.router
                    .dispatch(AgentMessage::CapabilitiesResponse { request_id, agent })
                    .await;
                Ok(())
            }
            other => {
                self.router.dispatch(other).await;
                Ok(())
            }
        }
    }
}
