//! Tool system for the agent.
//!
//! Tools are the executable capabilities a plan step resolves to. Each tool
//! carries metadata (capability tags, required permissions, a timeout) and the
//! registry indexes it by name, by capability and by domain. The domain is
//! the first `_`-delimited segment of the tool name (`file_operation` → `file`).
//!
//! Tools are registered during setup and shared read-only afterwards
//! (`Arc<ToolRegistry>`); lookups take no locks and tools must be safe to
//! invoke concurrently.

mod blackboard;
mod calculator;
mod file_ops;

pub use blackboard::{BlackboardRecall, BlackboardStore};
pub use calculator::Calculator;
pub use file_ops::FileOperation;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// Parameters passed to a tool.
pub type Params = Map<String, Value>;

// ============================================================================
// Path Resolution Utilities
// ============================================================================

/// Result of resolving a path relative to the workspace.
#[derive(Debug, Clone)]
pub struct PathResolution {
    /// The original path string provided by the step.
    pub original: String,
    /// The fully resolved path.
    pub resolved: PathBuf,
    /// Whether the resolved path is outside the workspace.
    pub is_outside_workspace: bool,
}

/// Resolve a path relative to the workspace.
///
/// Relative and absolute paths are both accepted; `is_outside_workspace`
/// reports whether the result escapes the workspace (after `..` is applied).
pub fn resolve_path(path_str: &str, workspace: &Path) -> PathResolution {
    let path = Path::new(path_str);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    };

    let canonical_workspace = workspace
        .canonicalize()
        .unwrap_or_else(|_| normalize(workspace));
    let canonical_resolved = resolved
        .canonicalize()
        .unwrap_or_else(|_| normalize(&resolved));

    let is_outside_workspace = !canonical_resolved.starts_with(&canonical_workspace);

    PathResolution {
        original: path_str.to_string(),
        resolved,
        is_outside_workspace,
    }
}

/// Lexically normalize a path that may not exist yet.
///
/// The longest existing ancestor is canonicalized so symlinked workspaces
/// compare equal to their canonical form.
fn normalize(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }

    let mut out = existing.canonicalize().unwrap_or(existing);
    for part in tail.into_iter().rev() {
        let part = PathBuf::from(part);
        for component in part.components() {
            match component {
                std::path::Component::ParentDir => {
                    out.pop();
                }
                std::path::Component::CurDir => {}
                other => out.push(other.as_os_str()),
            }
        }
    }
    out
}

// ============================================================================
// Tool Trait and Registry
// ============================================================================

/// Descriptive metadata for a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolMetadata {
    /// Unique name (registry key)
    pub name: String,
    pub description: String,
    /// Capability tags used for requirement matching
    pub capabilities: Vec<String>,
    /// Permissions an external gate must have granted
    pub required_permissions: Vec<String>,
    /// JSON schema for the parameters
    pub parameters_schema: Value,
    /// Upper bound on a single invocation
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Hint that the tool performs I/O and should not be treated as instantaneous
    pub is_async: bool,
    pub cost_estimate: Option<String>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: Vec::new(),
            required_permissions: Vec::new(),
            parameters_schema: Value::Object(Map::new()),
            timeout: Duration::from_secs(60),
            is_async: true,
            cost_estimate: None,
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.parameters_schema = schema;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn synchronous(mut self) -> Self {
        self.is_async = false;
        self
    }

    pub fn with_cost_estimate(mut self, estimate: impl Into<String>) -> Self {
        self.cost_estimate = Some(estimate.into());
        self
    }

    /// Domain derived from the first `_`-delimited segment of the name.
    pub fn domain(&self) -> &str {
        domain_of(&self.name)
    }
}

fn domain_of(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

mod duration_secs {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

/// Trait for implementing tools.
///
/// Tools must be stateless (or internally synchronized): the registry may
/// invoke the same tool from several agents at once.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Metadata describing this tool.
    fn metadata(&self) -> &ToolMetadata;

    /// Validate parameters before execution.
    ///
    /// Returns a human-readable reason on rejection.
    fn validate(&self, _params: &Params) -> Result<(), String> {
        Ok(())
    }

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: &Params) -> anyhow::Result<Value>;
}

/// Errors from resolving or running a tool.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters for tool {tool}: {reason}")]
    InvalidParameters { tool: String, reason: String },

    #[error("Tool {tool} failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("Tool {tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },
}

impl ToolError {
    /// Whether the tool was missing, as opposed to present but failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ToolError::NotFound(_))
    }
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    by_capability: HashMap<String, BTreeSet<String>>,
    by_domain: HashMap<String, BTreeSet<String>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in tools.
    ///
    /// `file_operation` is rooted at `workspace`. Blackboard tools are added
    /// separately via [`ToolRegistry::register`] since they need a board.
    pub fn with_builtins(workspace: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Calculator::new()));
        registry.register(Arc::new(FileOperation::new(workspace)));
        registry
    }

    /// Add a tool, replacing any tool already registered under the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.metadata().name.clone();
        if self.tools.contains_key(&name) {
            self.remove_from_indexes(&name);
        }

        let meta = tool.metadata();
        for capability in &meta.capabilities {
            self.by_capability
                .entry(capability.clone())
                .or_default()
                .insert(name.clone());
        }
        self.by_domain
            .entry(meta.domain().to_string())
            .or_default()
            .insert(name.clone());

        tracing::info!(
            "Registered tool: {} with capabilities {:?}",
            name,
            meta.capabilities
        );
        self.tools.insert(name, tool);
    }

    /// Remove a tool and its index entries. Returns whether it existed.
    pub fn unregister(&mut self, name: &str) -> bool {
        if !self.tools.contains_key(name) {
            return false;
        }
        self.remove_from_indexes(name);
        self.tools.remove(name);
        tracing::info!("Unregistered tool: {}", name);
        true
    }

    fn remove_from_indexes(&mut self, name: &str) {
        let Some(tool) = self.tools.get(name) else {
            return;
        };
        let meta = tool.metadata();

        for capability in &meta.capabilities {
            if let Some(names) = self.by_capability.get_mut(capability) {
                names.remove(name);
                if names.is_empty() {
                    self.by_capability.remove(capability);
                }
            }
        }

        let domain = meta.domain().to_string();
        if let Some(names) = self.by_domain.get_mut(&domain) {
            names.remove(name);
            if names.is_empty() {
                self.by_domain.remove(&domain);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tools declaring the given capability tag, ordered by name.
    pub fn find_by_capability(&self, capability: &str) -> Vec<Arc<dyn Tool>> {
        self.collect_index(self.by_capability.get(capability))
    }

    /// Tools in the given domain, ordered by name.
    pub fn find_by_domain(&self, domain: &str) -> Vec<Arc<dyn Tool>> {
        self.collect_index(self.by_domain.get(domain))
    }

    /// Tools whose name occurs in the action text (case-insensitive).
    ///
    /// Deliberately loose: `"use calculator to add"` matches `calculator`.
    /// Longer names come first so the most specific tool wins.
    pub fn find_by_action(&self, action: &str) -> Vec<Arc<dyn Tool>> {
        let action = action.to_lowercase();
        let mut matches: Vec<&String> = self
            .tools
            .keys()
            .filter(|name| action.contains(&name.to_lowercase()))
            .collect();
        matches.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        matches
            .into_iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    fn collect_index(&self, names: Option<&BTreeSet<String>>) -> Vec<Arc<dyn Tool>> {
        names
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.tools.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate and run a tool.
    pub async fn execute(&self, name: &str, params: &Params) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        tool.validate(params)
            .map_err(|reason| ToolError::InvalidParameters {
                tool: name.to_string(),
                reason,
            })?;

        tool.execute(params)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Whether every capability tag is provided by at least one tool.
    pub fn has_all_capabilities<S: AsRef<str>>(&self, capabilities: &[S]) -> bool {
        capabilities
            .iter()
            .all(|c| self.by_capability.contains_key(c.as_ref()))
    }

    /// Whether every named tool is registered.
    pub fn has_all_tools<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|n| self.tools.contains_key(n.as_ref()))
    }

    /// Metadata of every tool, ordered by name.
    pub fn list(&self) -> Vec<ToolMetadata> {
        let mut list: Vec<ToolMetadata> =
            self.tools.values().map(|t| t.metadata().clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// All capability tags, sorted.
    pub fn capabilities(&self) -> Vec<String> {
        let mut caps: Vec<String> = self.by_capability.keys().cloned().collect();
        caps.sort();
        caps
    }

    /// All domains, sorted.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.by_domain.keys().cloned().collect();
        domains.sort();
        domains
    }

    /// One line per tool, for planner prompts.
    pub fn describe_for_prompt(&self) -> String {
        self.list()
            .iter()
            .map(|t| {
                format!(
                    "- {}: {} (capabilities: {})",
                    t.name,
                    t.description,
                    t.capabilities.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
