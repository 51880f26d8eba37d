//! Terminal/shell command execution tool.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;

use super::{parse_args, Tool, ToolError};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Run a shell command.
pub struct Bash;

#[derive(Deserialize)]
struct BashArgs {
    command: String,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[async_trait]
impl Tool for Bash {
    fn name(&self) -> &str {
        "Bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory. Returns the combined stdout and stderr output. Use for listing files, running tests, compiling code, etc."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 120)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> Result<String, ToolError> {
        let args: BashArgs = parse_args(args)?;
        let timeout_secs = args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        tracing::info!("Executing command: {}", args.command);

        // Determine shell based on OS. stderr is folded into stdout inside the
        // shell so both streams share one pipe and keep their write order.
        let (shell, shell_arg, script) = if cfg!(target_os = "windows") {
            ("cmd", "/C", format!("({}) 2>&1", args.command))
        } else {
            ("sh", "-c", format!("exec 2>&1\n{}", args.command))
        };

        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            Command::new(shell)
                .arg(shell_arg)
                .arg(&script)
                .current_dir(workspace)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ToolError::TimedOut(timeout_secs))?
        .map_err(|e| ToolError::io("running command", e))?;

        // The exit status is deliberately not part of the result.
        tracing::debug!("Command exited with {:?}", output.status.code());

        // stderr only holds what the shell wrote before the redirect took effect.
        let mut result = String::from_utf8_lossy(&output.stdout).into_owned();
        result.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = Bash
            .execute(json!({"command": "echo hello"}), dir.path())
            .await
            .unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn runs_in_the_workspace_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let out = Bash
            .execute(json!({"command": "ls"}), dir.path())
            .await
            .unwrap();
        assert_eq!(out, "marker.txt\n");
    }

    #[tokio::test]
    async fn failing_command_still_returns_its_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = Bash
            .execute(
                json!({"command": "echo partial; echo oops >&2; exit 3"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(out, "partial\noops\n");
    }

    #[tokio::test]
    async fn stderr_and_stdout_stay_in_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let out = Bash
            .execute(
                json!({"command": "echo first >&2; echo second; echo third >&2"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(out, "first\nsecond\nthird\n");
    }

    #[tokio::test]
    async fn multi_line_commands_run_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let out = Bash
            .execute(json!({"command": "echo one\necho two >&2"}), dir.path())
            .await
            .unwrap();
        assert_eq!(out, "one\ntwo\n");
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = Bash
            .execute(json!({"command": "sleep 5", "timeout_secs": 1}), dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "command timed out after 1 seconds");
    }

    #[tokio::test]
    async fn missing_command_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = Bash.execute(json!({}), dir.path()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
