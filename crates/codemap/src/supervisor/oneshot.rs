//! Fallback invocation: one analyzer subprocess per call, used once the
//! crash budget is exhausted.

use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;

use super::process::spawn_with_retry;
use super::SupervisorConfig;
use crate::error::{ErrorEnvelope, SupervisorError};

pub(super) async fn call(
    config: &SupervisorConfig,
    command: &str,
    project: &str,
    args: &Value,
    timeout: Duration,
) -> Result<Value, SupervisorError> {
    let args_json = serde_json::to_string(args)?;

    let mut cmd = tokio::process::Command::new(&config.analyzer_command);
    cmd.arg("--one-shot")
        .arg("--command")
        .arg(command)
        .arg("--project")
        .arg(project)
        .arg("--args")
        .arg(&args_json)
        .env(&config.module_search_path_env, &config.module_search_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = spawn_with_retry(&mut cmd, &config.analyzer_command).await?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(SupervisorError::Io(source)),
        Err(_) => return Err(SupervisorError::Timeout(timeout)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(stderr.trim()) {
            return Err(SupervisorError::Analyzer {
                error_type: envelope.error_type,
                message: envelope.message,
            });
        }
        return Err(SupervisorError::NonZeroExit {
            status: output.status,
            stderr: stderr.into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .map_err(|source| SupervisorError::Protocol(format!("unparseable one-shot result: {source}")))
}
