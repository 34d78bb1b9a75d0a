//! File operations confined to the workspace: read, write, list, delete, exists.
//!
//! Paths are relative to the workspace root. Anything resolving outside it
//! (absolute paths, `..` escapes) is rejected.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{resolve_path, Params, Tool, ToolMetadata};

const OPERATIONS: [&str; 5] = ["read", "write", "list", "delete", "exists"];

pub struct FileOperation {
    meta: ToolMetadata,
    workspace: PathBuf,
}

impl FileOperation {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            meta: ToolMetadata::new(
                "file_operation",
                "Performs file system operations (read, write, list, delete, exists) inside the workspace",
            )
            .with_capabilities(["file_read", "file_write", "file_list", "file_delete"])
            .with_permissions(["file_read", "file_write"])
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "operation": { "type": "string", "enum": OPERATIONS },
                    "path": { "type": "string", "description": "Path relative to the workspace" },
                    "content": { "type": "string", "description": "Required for write" }
                },
                "required": ["operation", "path"]
            }))
            .with_timeout(Duration::from_secs(30))
            .with_cost_estimate("low"),
            workspace: workspace.into(),
        }
    }

    /// True when `path` names the workspace directory itself.
    fn is_workspace_root(&self, path: &Path) -> bool {
        match (path.canonicalize(), self.workspace.canonicalize()) {
            (Ok(path), Ok(root)) => path == root,
            _ => false,
        }
    }
}

#[async_trait]
impl Tool for FileOperation {
    fn metadata(&self) -> &ToolMetadata {
        &self.meta
    }

    fn validate(&self, params: &Params) -> Result<(), String> {
        let op = params
            .get("operation")
            .and_then(Value::as_str)
            .ok_or("missing 'operation'")?;
        if !OPERATIONS.contains(&op) {
            return Err(format!("unknown operation: {}", op));
        }
        if params.get("path").and_then(Value::as_str).is_none() {
            return Err("missing 'path'".to_string());
        }
        if op == "write" && params.get("content").and_then(Value::as_str).is_none() {
            return Err("write requires 'content'".to_string());
        }
        Ok(())
    }

    async fn execute(&self, params: &Params) -> anyhow::Result<Value> {
        let op = params
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Missing 'operation' argument"))?;
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Missing 'path' argument"))?;

        let resolution = resolve_path(path, &self.workspace);
        if resolution.is_outside_workspace {
            anyhow::bail!(
                "Path outside workspace: {} (resolved to: {})",
                path,
                resolution.resolved.display()
            );
        }
        let full = resolution.resolved;
        if matches!(op, "write" | "delete") && self.is_workspace_root(&full) {
            anyhow::bail!("Refusing to {} the workspace root", op);
        }

        match op {
            "read" => {
                if !full.is_file() {
                    anyhow::bail!("File not found: {}", path);
                }
                let content = tokio::fs::read_to_string(&full).await?;
                Ok(json!({
                    "path": path,
                    "size_bytes": content.len(),
                    "content": content,
                }))
            }
            "write" => {
                let content = params
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("Missing 'content' argument"))?;
                if let Some(parent) = full.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&full, content).await?;
                tracing::debug!("Wrote {} bytes to {}", content.len(), full.display());
                Ok(json!({ "path": path, "bytes_written": content.len() }))
            }
            "list" => {
                if !full.is_dir() {
                    anyhow::bail!("Directory not found: {}", path);
                }
                let mut items = Vec::new();
                let mut entries = tokio::fs::read_dir(&full).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let meta = entry.metadata().await?;
                    items.push(json!({
                        "name": entry.file_name().to_string_lossy(),
                        "is_dir": meta.is_dir(),
                        "size": if meta.is_file() { meta.len() } else { 0 },
                    }));
                }
                items.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
                Ok(json!({ "path": path, "count": items.len(), "items": items }))
            }
            "delete" => {
                if full.is_dir() {
                    tokio::fs::remove_dir_all(&full).await?;
                } else if full.exists() {
                    tokio::fs::remove_file(&full).await?;
                }
                Ok(json!({ "path": path, "deleted": true }))
            }
            "exists" => Ok(json!({
                "path": path,
                "exists": full.exists(),
                "is_file": full.is_file(),
                "is_dir": full.is_dir(),
            })),
            other => anyhow::bail!("Unknown operation: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_write_read_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileOperation::new(dir.path());

        tool.execute(&params(json!({
            "operation": "write", "path": "notes/a.txt", "content": "hello"
        })))
        .await
        .unwrap();

        let read = tool
            .execute(&params(json!({"operation": "read", "path": "notes/a.txt"})))
            .await
            .unwrap();
        assert_eq!(read["content"], "hello");
        assert_eq!(read["size_bytes"], 5);

        let listed = tool
            .execute(&params(json!({"operation": "list", "path": "notes"})))
            .await
            .unwrap();
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["items"][0]["name"], "a.txt");

        tool.execute(&params(json!({"operation": "delete", "path": "notes/a.txt"})))
            .await
            .unwrap();
        let exists = tool
            .execute(&params(json!({"operation": "exists", "path": "notes/a.txt"})))
            .await
            .unwrap();
        assert_eq!(exists["exists"], false);
    }

    #[tokio::test]
    async fn test_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileOperation::new(dir.path());

        let err = tool
            .execute(&params(json!({"operation": "read", "path": "../../etc/passwd"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("outside workspace"));
    }

    #[tokio::test]
    async fn test_workspace_root_cannot_be_deleted_or_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "data").unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();
        let tool = FileOperation::new(dir.path());

        for path in ["", ".", "notes/.."] {
            let err = tool
                .execute(&params(json!({"operation": "delete", "path": path})))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("workspace root"), "{}", err);
        }
        let err = tool
            .execute(&params(json!({"operation": "write", "path": ".", "content": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("workspace root"));

        assert!(dir.path().join("keep.txt").is_file());
    }

    #[test]
    fn test_validate() {
        let tool = FileOperation::new(".");
        assert!(tool
            .validate(&params(json!({"operation": "write", "path": "a"})))
            .is_err());
        assert!(tool
            .validate(&params(json!({"operation": "chmod", "path": "a"})))
            .is_err());
        assert!(tool
            .validate(&params(json!({"operation": "read", "path": "a"})))
            .is_ok());
    }
}
