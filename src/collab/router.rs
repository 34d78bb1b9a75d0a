//! Inbound message routing.
//!
//! Requests register a waiter under their correlation id; `dispatch` hands
//! each inbound response to its waiter. Responses nobody waits for (late
//! answers to timed-out delegations) are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Mutex, RwLock};

use super::message::AgentMessage;
use super::types::AgentReference;
use crate::blackboard::Blackboard;

/// Routes inbound messages to waiters and shared state.
pub struct ResponseRouter {
    pending: Mutex<HashMap<String, oneshot::Sender<AgentMessage>>>,
    groups: RwLock<HashMap<String, Vec<AgentReference>>>,
    heartbeats: RwLock<HashMap<String, DateTime<Utc>>>,
    blackboard: Option<Arc<Blackboard>>,
}

impl ResponseRouter {
    pub fn new(blackboard: Option<Arc<Blackboard>>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
            heartbeats: RwLock::new(HashMap::new()),
            blackboard,
        }
    }

    /// Register a request that expects a correlated response.
    pub async fn register(&self, correlation_id: String) -> oneshot::Receiver<AgentMessage> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().await;
        pending.insert(correlation_id, tx);
        rx
    }

    /// Forget a waiter (after a timeout).
    pub async fn cancel(&self, correlation_id: &str) -> bool {
        self.pending.lock().await.remove(correlation_id).is_some()
    }

    /// Number of requests still waiting for a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Handle one inbound message.
    pub async fn dispatch(&self, message: AgentMessage) {
        let response_id = match &message {
            AgentMessage::TaskResponse { task_id: id, .. }
            | AgentMessage::CapabilitiesResponse { request_id: id, .. } => Some(id.clone()),
            _ => None,
        };

        if let Some(id) = response_id {
            let waiter = self.pending.lock().await.remove(&id);
            match waiter {
                Some(tx) => {
                    tracing::debug!("Routing {} for {}", message.kind(), id);
                    let _ = tx.send(message);
                }
                None => {
                    tracing::debug!("Dropping {} for unknown id {}", message.kind(), id);
                }
            }
            return;
        }

        match &message {
            AgentMessage::ResourceShare {
                key,
                value,
                author,
                confidence,
                source_device_id,
            } => match &self.blackboard {
                Some(board) => {
                    let version =
                        board.put_with(key.as_str(), value.clone(), author.as_str(), *confidence, Vec::new());
                    tracing::debug!(
                        "Stored shared fact '{}' from {} at v{}",
                        key,
                        source_device_id,
                        version
                    );
                }
                None => {
                    tracing::debug!("No blackboard; ignoring shared fact '{}'", key);
                }
            },

            AgentMessage::GroupCreation {
                group_id,
                members,
                source_device_id,
            } => {
                tracing::info!(
                    "Group {} created by {} with {} members",
                    group_id,
                    source_device_id,
                    members.len()
                );
                self.groups
                    .write()
                    .await
                    .insert(group_id.clone(), members.clone());
            }

            AgentMessage::Heartbeat {
                source_device_id,
                timestamp,
            } => {
                tracing::trace!("Heartbeat from {}", source_device_id);
                self.heartbeats
                    .write()
                    .await
                    .insert(source_device_id.clone(), *timestamp);
            }

            _ => {
                tracing::debug!("Ignoring inbound {}; no local handler", message.kind());
            }
        }
    }

    /// Members of a group announced by a peer.
    pub async fn group(&self, group_id: &str) -> Option<Vec<AgentReference>> {
        self.groups.read().await.get(group_id).cloned()
    }

    /// Last heartbeat received from a device.
    pub async fn last_heartbeat(&self, device_id: &str) -> Option<DateTime<Utc>> {
        self.heartbeats.read().await.get(device_id).copied()
    }
}
