//! Blackboard tools - let plan steps store and recall shared facts.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Params, Tool, ToolMetadata};
use crate::blackboard::Blackboard;

/// Tool for writing a fact to the shared blackboard.
pub struct BlackboardStore {
    meta: ToolMetadata,
    board: Arc<Blackboard>,
}

impl BlackboardStore {
    pub fn new(board: Arc<Blackboard>) -> Self {
        Self {
            meta: ToolMetadata::new(
                "blackboard_store",
                "Store a fact on the shared blackboard so other steps and agents can use it",
            )
            .with_capabilities(["memory"])
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string" },
                    "value": { "description": "Any JSON value" },
                    "agent": { "type": "string", "description": "Author of the fact" },
                    "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                },
                "required": ["key", "value"]
            }))
            .synchronous()
            .with_cost_estimate("low"),
            board,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoreArgs {
    key: String,
    value: Value,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

#[async_trait]
impl Tool for BlackboardStore {
    fn metadata(&self) -> &ToolMetadata {
        &self.meta
    }

    fn validate(&self, params: &Params) -> Result<(), String> {
        match params.get("key").and_then(Value::as_str) {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err("missing 'key'".to_string()),
        }
        if !params.contains_key("value") {
            return Err("missing 'value'".to_string());
        }
        Ok(())
    }

    async fn execute(&self, params: &Params) -> anyhow::Result<Value> {
        let args: StoreArgs = serde_json::from_value(Value::Object(params.clone()))?;
        let author = args.agent.unwrap_or_else(|| "tool".to_string());

        let version = self
            .board
            .put_with(&args.key, args.value, author, args.confidence, Vec::new());
        tracing::debug!("Stored fact '{}' at v{}", args.key, version);

        Ok(json!({ "key": args.key, "version": version }))
    }
}

/// Tool for reading the latest value of a fact.
pub struct BlackboardRecall {
    meta: ToolMetadata,
    board: Arc<Blackboard>,
}

impl BlackboardRecall {
    pub fn new(board: Arc<Blackboard>) -> Self {
        Self {
            meta: ToolMetadata::new(
                "blackboard_recall",
                "Recall the latest value of a fact from the shared blackboard",
            )
            .with_capabilities(["memory"])
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string" }
                },
                "required": ["key"]
            }))
            .synchronous()
            .with_cost_estimate("low"),
            board,
        }
    }
}

#[async_trait]
impl Tool for BlackboardRecall {
    fn metadata(&self) -> &ToolMetadata {
        &self.meta
    }

    fn validate(&self, params: &Params) -> Result<(), String> {
        params
            .get("key")
            .and_then(Value::as_str)
            .map(|_| ())
            .ok_or_else(|| "missing 'key'".to_string())
    }

    async fn execute(&self, params: &Params) -> anyhow::Result<Value> {
        let key = params
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Missing 'key' argument"))?;

        let entry = self
            .board
            .get_entry(key)
            .ok_or_else(|| anyhow::anyhow!("No fact stored under '{}'", key))?;

        Ok(json!({
            "key": entry.key,
            "value": entry.value,
            "author": entry.author,
            "confidence": entry.confidence,
            "version": entry.version,
        }))
    }
}
