//! Sidecar supervisor: owns a single analyzer subprocess and exposes a
//! `run` operation that is safe to call concurrently but serializes all
//! callers onto one underlying IPC channel.
//!
//! A single write-then-read-under-mutex protocol: no background reader
//! task, no pending-request table, because only one request is ever in
//! flight per supervisor.

mod oneshot;
mod process;
mod sidecar;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use sidecar::SidecarHandle;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SupervisorError;

/// Configuration the supervisor needs to spawn and talk to the analyzer.
/// A subset of [`crate::config::CodemapConfig`], kept separate so this
/// module has no dependency on the rest of the crate's configuration shape.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Executable to spawn, in both sidecar and one-shot mode.
    pub analyzer_command: PathBuf,
    /// Directory injected via `module_search_path_env` so the analyzer can
    /// locate its own package.
    pub module_search_path: PathBuf,
    /// Environment variable name used to carry `module_search_path`.
    pub module_search_path_env: String,
    /// How long to wait for the sidecar's one-line ready signal.
    pub startup_timeout: Duration,
    pub call_timeout: Duration,
    pub shutdown_grace: Duration,
    pub crash_window: Duration,
    pub crash_budget: u32,
    pub mirror_stderr: bool,
}

struct SupervisorState {
    sidecar: Option<SidecarHandle>,
    crash_times: Vec<Instant>,
}

/// Borrow the running sidecar out of `state`. Returns an error rather than
/// panicking if called before a sidecar has been spawned, which should
/// never happen given the call sites always spawn first.
fn sidecar_handle(state: &mut SupervisorState) -> Result<&mut SidecarHandle, SupervisorError> {
    state
        .sidecar
        .as_mut()
        .ok_or_else(|| SupervisorError::StartupFailed("sidecar handle missing after spawn".into()))
}

/// Owns the sidecar's lifetime. One instance per process.
pub struct Supervisor {
    state: Mutex<SupervisorState>,
    fallback: AtomicBool,
    next_id: AtomicU64,
    config: SupervisorConfig,
}

enum RequestOutcome {
    Success(Value),
    Analyzer { error_type: String, message: String },
    Timeout,
    Eof,
    ProtocolViolation(String),
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            state: Mutex::new(SupervisorState {
                sidecar: None,
                crash_times: Vec::new(),
            }),
            fallback: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// True once the crash budget has been exhausted; never resets.
    pub fn is_fallback(&self) -> bool {
        self.fallback.load(Ordering::SeqCst)
    }

    /// Invoke `command` against `project` with `args`, via the sidecar if
    /// healthy, or via a one-shot subprocess once fallback has been entered.
    pub async fn run(
        &self,
        command: &str,
        project: &str,
        args: Value,
        cancellation: &CancellationToken,
    ) -> Result<Value, SupervisorError> {
        if self.is_fallback() {
            return oneshot::call(&self.config, command, project, &args, self.config.call_timeout)
                .await;
        }

        let mut state = tokio::select! {
            guard = self.state.lock() => guard,
            _ = cancellation.cancelled() => return Err(SupervisorError::Cancelled),
        };

        self.run_locked(&mut state, command, project, args, cancellation)
            .await
    }

    async fn run_locked(
        &self,
        state: &mut SupervisorState,
        command: &str,
        project: &str,
        args: Value,
        cancellation: &CancellationToken,
    ) -> Result<Value, SupervisorError> {
        if state.sidecar.is_none() {
            state.sidecar = Some(SidecarHandle::spawn(&self.config).await?);
        }
        let handle = sidecar_handle(state)?;

        let outcome = self
            .try_request(handle, command, project, args.clone(), cancellation)
            .await?;

        match outcome {
            RequestOutcome::Success(value) => Ok(value),
            RequestOutcome::Analyzer {
                error_type,
                message,
            } => Err(SupervisorError::Analyzer {
                error_type,
                message,
            }),
            RequestOutcome::Timeout => Err(SupervisorError::Timeout(self.config.call_timeout)),
            RequestOutcome::ProtocolViolation(reason) => {
                self.teardown_and_record_crash(state).await;
                Err(SupervisorError::Protocol(reason))
            }
            RequestOutcome::Eof => {
                self.teardown_and_record_crash(state).await;
                if self.is_fallback() {
                    return oneshot::call(
                        &self.config,
                        command,
                        project,
                        &args,
                        self.config.call_timeout,
                    )
                    .await;
                }

                state.sidecar = Some(SidecarHandle::spawn(&self.config).await?);
                let handle = sidecar_handle(state)?;
                let retry = self
                    .try_request(handle, command, project, args.clone(), cancellation)
                    .await?;

                match retry {
                    RequestOutcome::Success(value) => Ok(value),
                    RequestOutcome::Analyzer {
                        error_type,
                        message,
                    } => Err(SupervisorError::Analyzer {
                        error_type,
                        message,
                    }),
                    RequestOutcome::Timeout => {
                        Err(SupervisorError::Timeout(self.config.call_timeout))
                    }
                    RequestOutcome::ProtocolViolation(reason) => {
                        self.teardown_and_record_crash(state).await;
                        Err(SupervisorError::Protocol(reason))
                    }
                    RequestOutcome::Eof => {
                        self.teardown_and_record_crash(state).await;
                        if self.is_fallback() {
                            oneshot::call(
                                &self.config,
                                command,
                                project,
                                &args,
                                self.config.call_timeout,
                            )
                            .await
                        } else {
                            Err(SupervisorError::Crash(
                                "sidecar closed its output stream on retry".into(),
                            ))
                        }
                    }
                }
            }
        }
    }

    async fn try_request(
        &self,
        handle: &mut SidecarHandle,
        command: &str,
        project: &str,
        args: Value,
        cancellation: &CancellationToken,
    ) -> Result<RequestOutcome, SupervisorError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::json!({
            "id": id,
            "command": command,
            "project": project,
            "args": args,
        });
        let line = serde_json::to_string(&request)?;

        let write = tokio::select! {
            result = handle.write_line(&line) => result,
            _ = cancellation.cancelled() => return Err(SupervisorError::Cancelled),
        };
        if write.is_err() {
            return Ok(RequestOutcome::Eof);
        }

        let read = tokio::select! {
            result = tokio::time::timeout(self.config.call_timeout, handle.read_line()) => result,
            _ = cancellation.cancelled() => return Err(SupervisorError::Cancelled),
        };

        let line = match read {
            Err(_) => return Ok(RequestOutcome::Timeout),
            Ok(Err(_)) => return Ok(RequestOutcome::Eof),
            Ok(Ok(None)) => return Ok(RequestOutcome::Eof),
            Ok(Ok(Some(line))) => line,
        };

        let response: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(source) => {
                return Ok(RequestOutcome::ProtocolViolation(format!(
                    "unparseable response: {source}"
                )))
            }
        };

        let response_id = response.get("id").and_then(Value::as_u64);
        if response_id != Some(id) {
            return Ok(RequestOutcome::ProtocolViolation(format!(
                "response id {response_id:?} does not match request id {id}"
            )));
        }

        if let Some(error) = response.get("error") {
            let error_type = error
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("AnalyzerError")
                .to_string();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Ok(RequestOutcome::Analyzer {
                error_type,
                message,
            });
        }

        Ok(RequestOutcome::Success(
            response.get("result").cloned().unwrap_or(Value::Null),
        ))
    }

    async fn teardown_and_record_crash(&self, state: &mut SupervisorState) {
        if let Some(mut handle) = state.sidecar.take() {
            handle.kill_and_wait().await;
        }

        let now = Instant::now();
        state.crash_times.push(now);
        state
            .crash_times
            .retain(|t| now.duration_since(*t) <= self.config.crash_window);

        if state.crash_times.len() as u32 >= self.config.crash_budget {
            if !self.fallback.swap(true, Ordering::SeqCst) {
                warn!(
                    crash_count = state.crash_times.len(),
                    "sidecar crash budget exhausted, entering permanent fallback mode"
                );
            }
        } else {
            debug!(crash_count = state.crash_times.len(), "sidecar crash recorded");
        }
    }

    /// Idempotent shutdown: closes the sidecar if one is running. Safe to
    /// call more than once.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut handle) = state.sidecar.take() {
            handle.shutdown(self.config.shutdown_grace).await;
        }
    }
}

async fn mirror_stderr(stderr: ChildStderr, mirror: bool) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if mirror {
            eprintln!("[analyzer] {line}");
        } else {
            debug!(target: "analyzer_stderr", "{line}");
        }
    }
}
