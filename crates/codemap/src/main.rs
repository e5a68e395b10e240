//! `codemap-mcp`: entry point wiring configuration, the registry cache, the
//! sidecar supervisor, the agent overlay client, and the dispatch layer
//! together, then serving MCP over stdio.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use codemap::agent_overlay::AgentOverlayClient;
use codemap::cache::Cache;
use codemap::config::{self, CodemapConfig};
use codemap::registry::ScanResult;
use codemap::supervisor::{Supervisor, SupervisorConfig};
use codemap::CodemapServer;

#[derive(Debug, Parser)]
#[command(name = "codemap-mcp", version, about = "Code-mapping MCP server over stdio")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Workspace root to scan when a tool call doesn't specify one.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the MCP stdio server. Also the default when no subcommand is given.
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Serve) | None => {}
    }
    let default_root = cli
        .root
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = CodemapConfig::from_env(default_root);

    let registry_cache: Cache<PathBuf, ScanResult> = Cache::new(config.cache_ttl, config.cache_max_size);

    let supervisor_config = SupervisorConfig {
        analyzer_command: PathBuf::from(&config.analyzer_binary),
        module_search_path: config.resolve_analyzer_path(),
        module_search_path_env: config::ANALYZER_MODULE_SEARCH_PATH_ENV.to_string(),
        startup_timeout: config.startup_timeout,
        call_timeout: config.call_timeout,
        shutdown_grace: config.shutdown_grace,
        crash_window: config.crash_window,
        crash_budget: config.crash_budget,
        mirror_stderr: config.mirror_analyzer_stderr,
    };
    let supervisor = Supervisor::new(supervisor_config);

    let agent_overlay = AgentOverlayClient::new(config.agent_overlay_url.clone(), config.http_timeout);

    let server = CodemapServer::new(config, registry_cache, supervisor, agent_overlay);

    let transport = rmcp::transport::io::stdio();
    let running = rmcp::serve_server(server.clone(), transport).await?;

    tracing::info!("codemap-mcp ready on stdio");
    running.waiting().await?;

    tokio::time::timeout(Duration::from_secs(5), server.close())
        .await
        .ok();

    Ok(())
}
