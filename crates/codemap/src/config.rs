//! Runtime configuration assembled from environment variables and CLI flags.
//!
//! A single config struct built once at startup and threaded through by
//! reference, rather than ad-hoc `env::var` calls scattered across the
//! crate.

use std::path::PathBuf;
use std::time::Duration;

/// Plugin root env var: points at the analyzer's package directory.
pub const ANALYZER_PATH_ENV: &str = "CODEMAP_ANALYZER_PATH";
/// Agent overlay base URL env var; unset disables the overlay.
pub const AGENT_OVERLAY_URL_ENV: &str = "CODEMAP_AGENT_OVERLAY_URL";
/// Analyzer binary override; defaults to `python3` on PATH.
pub const ANALYZER_BINARY_ENV: &str = "CODEMAP_ANALYZER_BINARY";
/// Override for the per-call supervisor timeout, in seconds.
pub const CALL_TIMEOUT_ENV: &str = "CODEMAP_CALL_TIMEOUT_SECS";
/// Override for the cache TTL, in seconds.
pub const CACHE_TTL_ENV: &str = "CODEMAP_CACHE_TTL_SECS";
/// Override for the cache max entry count.
pub const CACHE_MAX_SIZE_ENV: &str = "CODEMAP_CACHE_MAX_SIZE";
/// Environment variable name injected into the analyzer child process,
/// carrying `resolve_analyzer_path()`'s value. Distinct from
/// [`ANALYZER_PATH_ENV`], which the host reads to discover that path.
pub const ANALYZER_MODULE_SEARCH_PATH_ENV: &str = "PYTHONPATH";

const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const DEFAULT_CRASH_WINDOW: Duration = Duration::from_secs(10);
const DEFAULT_CRASH_BUDGET: u32 = 3;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_CACHE_MAX_SIZE: usize = 10;

/// Resolved configuration for a single server run.
#[derive(Clone, Debug)]
pub struct CodemapConfig {
    /// Workspace root to scan when none is given per-call.
    pub default_root: PathBuf,
    /// Directory added to the analyzer's module search path.
    pub analyzer_path: Option<PathBuf>,
    /// Analyzer binary (interpreter) to spawn.
    pub analyzer_binary: String,
    /// Base URL of the agent overlay service, if configured.
    pub agent_overlay_url: Option<String>,
    /// How long to wait for the sidecar's ready signal on startup.
    pub startup_timeout: Duration,
    /// Per-call supervisor timeout.
    pub call_timeout: Duration,
    /// Agent overlay HTTP client timeout.
    pub http_timeout: Duration,
    /// Supervisor shutdown grace period before force-kill.
    pub shutdown_grace: Duration,
    /// Sliding window over which crashes are counted.
    pub crash_window: Duration,
    /// Crash count within the window that triggers fallback.
    pub crash_budget: u32,
    /// Cache entry time-to-live.
    pub cache_ttl: Duration,
    /// Cache max entry count (non-positive requests coerce to 10).
    pub cache_max_size: usize,
    /// Mirror the analyzer's stderr to this process's stderr.
    pub mirror_analyzer_stderr: bool,
}

impl CodemapConfig {
    /// Build configuration from the environment and an optional root
    /// override (e.g. a `--root` CLI flag).
    pub fn from_env(default_root: PathBuf) -> Self {
        let analyzer_path = std::env::var(ANALYZER_PATH_ENV).ok().map(PathBuf::from);
        let analyzer_binary =
            std::env::var(ANALYZER_BINARY_ENV).unwrap_or_else(|_| "python3".to_string());
        let agent_overlay_url = std::env::var(AGENT_OVERLAY_URL_ENV)
            .ok()
            .filter(|s| !s.is_empty());

        Self {
            default_root,
            analyzer_path,
            analyzer_binary,
            agent_overlay_url,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            call_timeout: duration_env(CALL_TIMEOUT_ENV, DEFAULT_CALL_TIMEOUT),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            crash_window: DEFAULT_CRASH_WINDOW,
            crash_budget: DEFAULT_CRASH_BUDGET,
            cache_ttl: duration_env(CACHE_TTL_ENV, DEFAULT_CACHE_TTL),
            cache_max_size: usize_env(CACHE_MAX_SIZE_ENV, DEFAULT_CACHE_MAX_SIZE),
            mirror_analyzer_stderr: false,
        }
    }

    /// Resolve the analyzer's module search path: the configured plugin
    /// root env var, or (fallback) `<binary dir>/../python`.
    pub fn resolve_analyzer_path(&self) -> PathBuf {
        if let Some(path) = &self.analyzer_path {
            return path.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|bin| bin.parent().map(|p| p.to_path_buf()))
            .and_then(|dir| dir.parent().map(|p| p.to_path_buf()))
            .map(|grandparent| grandparent.join("python"))
            .unwrap_or_else(|| PathBuf::from("python"))
    }
}

fn duration_env(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn usize_env(var: &str, default: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_size_when_unset() {
        assert_eq!(usize_env("CODEMAP_TEST_UNSET_VAR_XYZ", 10), 10);
    }

    #[test]
    fn resolve_analyzer_path_prefers_env() {
        let cfg = CodemapConfig {
            analyzer_path: Some(PathBuf::from("/opt/analyzer")),
            ..CodemapConfig::from_env(PathBuf::from("/tmp"))
        };
        assert_eq!(cfg.resolve_analyzer_path(), PathBuf::from("/opt/analyzer"));
    }
}
