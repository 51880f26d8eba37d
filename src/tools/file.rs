//! File operation tools: Read, Write.

use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::de::Deserializer;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use super::{parse_args, Tool, ToolError};

/// Resolve `file_path` against the workspace and refuse `..` components.
///
/// Only the literal path is checked; symlinks are not followed.
fn resolve_path(workspace: &Path, file_path: &str) -> Result<PathBuf, ToolError> {
    let path = Path::new(file_path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    };

    if resolved.components().any(|c| c == Component::ParentDir) {
        return Err(ToolError::PathTraversal(file_path.to_string()));
    }

    Ok(resolved)
}

/// Read a file with line numbers.
pub struct ReadFile;

#[derive(Deserialize)]
struct ReadArgs {
    file_path: String,
    #[serde(default, deserialize_with = "lenient_count")]
    offset: Option<usize>,
    #[serde(default, deserialize_with = "lenient_count")]
    limit: Option<usize>,
}

/// Accept integers or numeric strings. Negative values clamp to zero;
/// anything unparseable counts as unset.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v as usize)
            .or_else(|| n.as_i64().map(|v| v.max(0) as usize))
            .or_else(|| n.as_f64().map(|v| v.max(0.0) as usize)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok().map(|v| v.max(0) as usize),
        _ => None,
    })
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "Read"
    }

    fn description(&self) -> &str {
        "Read a file from the local filesystem. Relative paths are resolved from the \
         current working directory. Returns the content with 1-based line numbers. \
         Use offset and limit to read part of a large file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file, absolute or relative to the working directory"
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of lines to skip before reading (default: 0; negative or non-numeric values read from the start)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default: rest of file; zero, negative or non-numeric values mean no limit)"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> Result<String, ToolError> {
        let args: ReadArgs = parse_args(args)?;
        let path = resolve_path(workspace, &args.file_path)?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound(path.display().to_string())
            } else {
                ToolError::io("reading file", e)
            }
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let offset = args.offset.unwrap_or(0);
        // A zero limit means "no limit", same as leaving it out.
        let limit = args.limit.filter(|&l| l > 0).unwrap_or(usize::MAX);

        Ok(number_lines(&content, offset, limit))
    }
}

fn number_lines(content: &str, offset: usize, limit: usize) -> String {
    let mut out = String::new();
    for (index, line) in content.lines().enumerate().skip(offset).take(limit) {
        let _ = writeln!(out, "{:>5}\t{}", index + 1, line);
    }
    out
}

/// Create or overwrite a file.
pub struct WriteFile;

#[derive(Deserialize)]
struct WriteArgs {
    file_path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "Write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it does not exist and \
         overwrites it if it does. The parent directory must already exist."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file, absolute or relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> Result<String, ToolError> {
        let args: WriteArgs = parse_args(args)?;
        let path = resolve_path(workspace, &args.file_path)?;

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ToolError::io("creating or truncating file", e))?;
        file.write_all(args.content.as_bytes())
            .await
            .map_err(|e| ToolError::io("writing to file", e))?;
        file.flush()
            .await
            .map_err(|e| ToolError::io("writing to file", e))?;

        tracing::info!("Wrote {} bytes to {}", args.content.len(), path.display());
        Ok(format!("successfully written to: {}", args.file_path))
    }
}
