//! Collaboration participants and strategies.

use serde::{Deserialize, Serialize};

/// Unique identity of one collaboration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointKey {
    pub device_id: String,
    pub agent_id: String,
}

impl EndpointKey {
    pub fn new(device_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            agent_id: agent_id.into(),
        }
    }
}

impl std::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.device_id, self.agent_id)
    }
}

/// A collaboration participant. Carries no behavior itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReference {
    pub device_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AgentReference {
    pub fn new(device_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            agent_id: agent_id.into(),
            device_name: None,
            agent_name: None,
            capabilities: Vec::new(),
        }
    }

    pub fn with_names(mut self, device_name: impl Into<String>, agent_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self.agent_name = Some(agent_name.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(&self.device_id, &self.agent_id)
    }
}

impl std::fmt::Display for AgentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.device_id, self.agent_id)
    }
}

/// How work is spread across a group of agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationStrategy {
    /// One after another; stop at the first failure
    Sequential,
    /// All at once; wait for every agent
    Parallel,
    /// First agent coordinates the rest
    Hierarchical,
}

impl std::fmt::Display for CollaborationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CollaborationStrategy::Sequential => "sequential",
            CollaborationStrategy::Parallel => "parallel",
            CollaborationStrategy::Hierarchical => "hierarchical",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for CollaborationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(CollaborationStrategy::Sequential),
            "parallel" => Ok(CollaborationStrategy::Parallel),
            "hierarchical" => Ok(CollaborationStrategy::Hierarchical),
            other => Err(format!("unknown collaboration strategy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_key_and_wire_names() {
        let agent = AgentReference::new("phone-1", "planner").with_capabilities(["math"]);
        assert_eq!(agent.key(), EndpointKey::new("phone-1", "planner"));
        assert_eq!(agent.key().to_string(), "phone-1:planner");

        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["deviceId"], "phone-1");
        assert_eq!(json["capabilities"][0], "math");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "Parallel".parse::<CollaborationStrategy>().unwrap(),
            CollaborationStrategy::Parallel
        );
        assert!("round-robin".parse::<CollaborationStrategy>().is_err());
    }
}
