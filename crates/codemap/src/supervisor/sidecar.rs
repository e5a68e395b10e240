//! Persistent sidecar child process: startup ready-signal protocol and the
//! single newline-delimited-JSON request/response pair.

use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};

use super::process::spawn_with_retry;
use super::SupervisorConfig;
use crate::error::SupervisorError;

/// Stdout is buffered at at least this size so one read never has to split
/// the largest expected analyzer response across multiple reads.
const STDOUT_BUFFER_CAPACITY: usize = 4 * 1024 * 1024;

pub(super) struct SidecarHandle {
    child: Child,
    stdin: ChildStdin,
    reader: Lines<BufReader<ChildStdout>>,
}

impl SidecarHandle {
    pub(super) async fn spawn(config: &SupervisorConfig) -> Result<Self, SupervisorError> {
        let mut command = tokio::process::Command::new(&config.analyzer_command);
        command
            .arg("--sidecar")
            .env(&config.module_search_path_env, &config.module_search_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = spawn_with_retry(&mut command, &config.analyzer_command).await?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::StartupFailed("child stdout unavailable".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SupervisorError::StartupFailed("child stdin unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(super::mirror_stderr(stderr, config.mirror_stderr));
        }

        let mut reader = BufReader::with_capacity(STDOUT_BUFFER_CAPACITY, stdout).lines();

        let ready_line = match tokio::time::timeout(config.startup_timeout, reader.next_line())
            .await
        {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                kill_and_wait(&mut child).await;
                return Err(SupervisorError::StartupFailed(
                    "sidecar failed to send ready signal: stdout closed".into(),
                ));
            }
            Ok(Err(source)) => {
                kill_and_wait(&mut child).await;
                return Err(SupervisorError::StartupFailed(format!(
                    "sidecar failed to send ready signal: {source}"
                )));
            }
            Err(_) => {
                kill_and_wait(&mut child).await;
                return Err(SupervisorError::StartupFailed(
                    "sidecar failed to send ready signal: timed out".into(),
                ));
            }
        };

        let ready: Value = match serde_json::from_str(&ready_line) {
            Ok(value) => value,
            Err(source) => {
                kill_and_wait(&mut child).await;
                return Err(SupervisorError::StartupFailed(format!(
                    "sidecar failed to send ready signal: unparseable: {source}"
                )));
            }
        };

        if ready.get("status").and_then(Value::as_str) != Some("ready") {
            kill_and_wait(&mut child).await;
            return Err(SupervisorError::StartupFailed(format!(
                "sidecar failed to send ready signal: got `{ready_line}`"
            )));
        }

        Ok(Self {
            child,
            stdin,
            reader,
        })
    }

    pub(super) async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    pub(super) async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        self.reader.next_line().await
    }

    pub(super) async fn kill_and_wait(&mut self) {
        kill_and_wait(&mut self.child).await;
    }

    /// Idempotent graceful shutdown: close stdin, give the child `grace` to
    /// exit on its own, then force-kill.
    pub(super) async fn shutdown(&mut self, grace: Duration) {
        let _ = self.stdin.shutdown().await;
        if tokio::time::timeout(grace, self.child.wait()).await.is_err() {
            kill_and_wait(&mut self.child).await;
        }
    }
}

async fn kill_and_wait(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}
