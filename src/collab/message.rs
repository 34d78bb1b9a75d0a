//! Wire protocol between collaborating devices.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "task_delegation", "taskId": "...", "task": "...", "parameters": {},
//!  "timeout": 300, "sourceDeviceId": "phone-1", "timestamp": "..."}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::AgentReference;
use crate::agents::AgentResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Ask an agent to execute a task
    #[serde(rename_all = "camelCase")]
    TaskDelegation {
        task_id: String,
        /// Target agent on the receiving device
        agent_id: String,
        task: String,
        #[serde(default)]
        parameters: Map<String, Value>,
        /// Seconds the sender will wait for the response
        timeout: u64,
        source_device_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Answer to a delegation, correlated by `task_id`
    #[serde(rename_all = "camelCase")]
    TaskResponse {
        task_id: String,
        result: AgentResult,
        source_device_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename_all = "camelCase")]
    CapabilitiesRequest {
        request_id: String,
        agent_id: String,
        source_device_id: String,
    },

    #[serde(rename_all = "camelCase")]
    CapabilitiesResponse {
        request_id: String,
        agent: AgentReference,
    },

    /// A fact offered to the receiver's blackboard
    #[serde(rename_all = "camelCase")]
    ResourceShare {
        key: String,
        value: Value,
        author: String,
        #[serde(default = "full_confidence")]
        confidence: f64,
        source_device_id: String,
    },

    #[serde(rename_all = "camelCase")]
    GroupCreation {
        group_id: String,
        members: Vec<AgentReference>,
        source_device_id: String,
    },

    #[serde(rename_all = "camelCase")]
    Heartbeat {
        source_device_id: String,
        timestamp: DateTime<Utc>,
    },
}

fn full_confidence() -> f64 {
    1.0
}

impl AgentMessage {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentMessage::TaskDelegation { .. } => "task_delegation",
            AgentMessage::TaskResponse { .. } => "task_response",
            AgentMessage::CapabilitiesRequest { .. } => "capabilities_request",
            AgentMessage::CapabilitiesResponse { .. } => "capabilities_response",
            AgentMessage::ResourceShare { .. } => "resource_share",
            AgentMessage::GroupCreation { .. } => "group_creation",
            AgentMessage::Heartbeat { .. } => "heartbeat",
        }
    }

    /// Correlation id of a request or response, if the type has one.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            AgentMessage::TaskDelegation { task_id, .. }
            | AgentMessage::TaskResponse { task_id, .. } => Some(task_id.as_str()),
            AgentMessage::CapabilitiesRequest { request_id, .. }
            | AgentMessage::CapabilitiesResponse { request_id, .. } => Some(request_id.as_str()),
            _ => None,
        }
    }
}
