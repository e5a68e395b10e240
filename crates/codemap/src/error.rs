//! Crate-wide error taxonomy.
//!
//! Each subsystem defines its own error enum; [`CodemapError`] composes them
//! at the crate root via `#[from]` so callers deep in the dispatch layer can
//! use `?` freely and still recover the original kind for shaping a tool
//! error result.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the project registry and path resolver.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read directory `{path}`: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path `{0}` is not absolute and could not be resolved")]
    NotAbsolute(PathBuf),
    #[error("path `{0}` is not inside any project (no `.git` ancestor)")]
    PathNotInProject(PathBuf),
}

/// Errors raised by the sidecar supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("sidecar failed to send ready signal: {0}")]
    StartupFailed(String),
    #[error("failed to spawn analyzer at `{path}`: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error("analyzer crashed: {0}")]
    Crash(String),
    #[error("analyzer returned a structured error: {error_type}: {message}")]
    Analyzer { error_type: String, message: String },
    #[error("request cancelled")]
    Cancelled,
    #[error("malformed response from analyzer: {0}")]
    Protocol(String),
    #[error("analyzer exited non-zero ({status:?}): {stderr}")]
    NonZeroExit {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("failed to serialize sidecar request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("io error talking to sidecar: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the agent overlay HTTP client.
#[derive(Debug, Error)]
pub enum AgentOverlayError {
    #[error("agent overlay returned HTTP {status}")]
    Status { status: u16 },
    #[error("failed to decode agent overlay response: {0}")]
    Decode(String),
    #[error("failed to reach agent overlay service: {0}")]
    Connection(String),
}

/// Top-level error kind carrying a stable taxonomy label for diagnostics.
#[derive(Debug, Error)]
pub enum CodemapError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    AgentOverlay(#[from] AgentOverlayError),
}

/// The `{type, message}` envelope carried across the sidecar/one-shot
/// boundary and surfaced verbatim in tool-error results.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl CodemapError {
    /// Single-line message prefixed with the tool name, so a tool-error
    /// result always identifies which call failed.
    pub fn tool_message(&self, tool_name: &str) -> String {
        format!("{tool_name}: {self}")
    }

    /// The error kind's taxonomy label, used for diagnostics and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            CodemapError::InvalidArgument(_) => "InvalidArgument",
            CodemapError::Registry(RegistryError::PathNotInProject(_)) => "PathNotInProject",
            CodemapError::Registry(_) => "ScanFailure",
            CodemapError::Supervisor(SupervisorError::Timeout(_)) => "AnalyzerTimeout",
            CodemapError::Supervisor(SupervisorError::Crash(_)) => "AnalyzerCrash",
            CodemapError::Supervisor(SupervisorError::Analyzer { .. }) => "AnalyzerError",
            CodemapError::Supervisor(_) => "AnalyzerError",
            CodemapError::AgentOverlay(AgentOverlayError::Connection(_)) => {
                "AgentServiceUnavailable"
            }
            CodemapError::AgentOverlay(_) => "AgentServiceError",
        }
    }
}
