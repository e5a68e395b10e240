//! Tool dispatch layer: the MCP-facing surface.
//!
//! A `Clone`-able server struct holding its collaborators behind `Arc`, a
//! `#[tool_router]` impl block for the tool methods themselves, and a thin
//! manual `ServerHandler` that delegates to the generated router.

mod args;
mod requests;

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool, tool_router, ErrorData, ServerHandler};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::agent_overlay::{Agent, AgentOverlayClient};
use crate::cache::{Cache, Lookup};
use crate::config::CodemapConfig;
use crate::error::CodemapError;
use crate::registry::{self, Project, ScanResult};
use crate::supervisor::Supervisor;

use requests::{
    AgentMapRequest, ChangeImpactRequest, CodeStructureRequest, CrossProjectDepsRequest,
    DetectPatternsRequest, ImpactAnalysisRequest, LiveChangesRequest, ProjectRegistryRequest,
    ResolveProjectRequest,
};

/// An agent overlay entry joined with the project it was matched to, if any.
#[derive(Debug, Serialize)]
struct AgentMapEntry {
    #[serde(flatten)]
    agent: Agent,
    matched_project_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct AgentMapResult {
    projects: ScanResult,
    agents: Vec<AgentMapEntry>,
    agents_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    agents_error: Option<String>,
}

/// MCP server: routes tool calls to native scans or the sidecar supervisor.
#[derive(Clone)]
pub struct CodemapServer {
    config: Arc<CodemapConfig>,
    registry_cache: Arc<Cache<PathBuf, ScanResult>>,
    supervisor: Arc<Supervisor>,
    agent_overlay: Arc<AgentOverlayClient>,
    tool_router: ToolRouter<CodemapServer>,
}

impl CodemapServer {
    pub fn new(
        config: CodemapConfig,
        registry_cache: Cache<PathBuf, ScanResult>,
        supervisor: Supervisor,
        agent_overlay: AgentOverlayClient,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry_cache: Arc::new(registry_cache),
            supervisor: Arc::new(supervisor),
            agent_overlay: Arc::new(agent_overlay),
            tool_router: Self::tool_router(),
        }
    }

    /// Release the sidecar subprocess, if one is running. Call on shutdown.
    pub async fn close(&self) {
        self.supervisor.close().await;
    }

    fn default_root(&self) -> PathBuf {
        self.config.default_root.clone()
    }
}

fn json_result<T: Serialize>(value: &T) -> CallToolResult {
    match serde_json::to_string(value) {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(source) => {
            CallToolResult::error(vec![Content::text(format!("failed to encode result: {source}"))])
        }
    }
}

fn error_result(tool_name: &str, error: CodemapError) -> CallToolResult {
    CallToolResult::error(vec![Content::text(error.tool_message(tool_name))])
}

async fn scan_cached(
    cache: &Cache<PathBuf, ScanResult>,
    root: &std::path::Path,
    refresh: bool,
) -> Result<ScanResult, CodemapError> {
    if !refresh {
        if let Lookup::Hit(scan) = cache.get(&root.to_path_buf(), "").await {
            return Ok(scan);
        }
    }

    let scan = registry::scan(root)?;
    cache.put(root.to_path_buf(), String::new(), scan.clone()).await;
    Ok(scan)
}

/// Match an agent to a scanned project: exact name match first, then a
/// substring match of project path ↔ agent project field in either
/// direction.
fn match_project<'a>(agent: &Agent, projects: &'a [Project]) -> Option<&'a Project> {
    projects
        .iter()
        .find(|p| p.name == agent.project)
        .or_else(|| {
            projects.iter().find(|p| {
                let path = p.path.to_string_lossy();
                path.contains(&agent.project) || agent.project.contains(path.as_ref())
            })
        })
}

#[tool_router]
impl CodemapServer {
    #[tool(description = "List discovered projects under a workspace root (cached scan).")]
    async fn project_registry(
        &self,
        Parameters(request): Parameters<ProjectRegistryRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let root = args::coerce_opt_string(&request.root)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_root());
        let refresh = args::coerce_bool(&request.refresh, false);
        debug!(root = %root.display(), refresh, "dispatching project_registry");

        match scan_cached(&self.registry_cache, &root, refresh).await {
            Ok(scan) => Ok(json_result(&scan)),
            Err(error) => Ok(error_result("project_registry", error)),
        }
    }

    #[tool(description = "Resolve a filesystem path to the project that owns it.")]
    async fn resolve_project(
        &self,
        Parameters(request): Parameters<ResolveProjectRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let path = match args::require_string(&request.path, "path") {
            Ok(path) => path,
            Err(error) => return Ok(error_result("resolve_project", error)),
        };
        debug!(path, "dispatching resolve_project");

        match registry::resolve(std::path::Path::new(&path)) {
            Ok(project) => Ok(json_result(&project)),
            Err(source) => Ok(error_result("resolve_project", CodemapError::from(source))),
        }
    }

    #[tool(description = "List active agents and their file reservations, joined with the project registry.")]
    async fn agent_map(
        &self,
        Parameters(request): Parameters<AgentMapRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let root = args::coerce_opt_string(&request.root)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_root());
        debug!(root = %root.display(), "dispatching agent_map");

        let projects = match registry::scan(&root) {
            Ok(projects) => projects,
            Err(source) => return Ok(error_result("agent_map", CodemapError::from(source))),
        };

        let (mut agents, agents_available, mut agents_error) = match self.agent_overlay.list_agents().await {
            Ok(agents) => (agents, true, None),
            Err(source) => {
                error!(error = %source, "agent overlay unreachable, returning projects without agent data");
                (Vec::new(), false, Some(source.to_string()))
            }
        };

        for agent in &mut agents {
            match self.agent_overlay.list_reservations(&agent.project).await {
                Ok(reservations) => {
                    agent.reservations = reservations
                        .into_iter()
                        .filter(|r| r.agent_id == agent.agent_id)
                        .map(|r| r.pattern)
                        .collect();
                }
                Err(source) => {
                    error!(agent_id = %agent.agent_id, error = %source, "agent overlay unreachable while fetching reservations");
                    agents_error.get_or_insert_with(|| source.to_string());
                }
            }
        }

        let entries = agents
            .into_iter()
            .map(|agent| {
                let matched_project_path = match_project(&agent, &projects)
                    .map(|p| p.path.to_string_lossy().into_owned());
                AgentMapEntry {
                    agent,
                    matched_project_path,
                }
            })
            .collect();

        Ok(json_result(&AgentMapResult {
            projects,
            agents: entries,
            agents_available,
            agents_error,
        }))
    }

    #[tool(description = "Return the structural map (symbols, files) of a project.")]
    async fn code_structure(
        &self,
        Parameters(request): Parameters<CodeStructureRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let project = match args::require_string(&request.project, "project") {
            Ok(project) => project,
            Err(error) => return Ok(error_result("code_structure", error)),
        };

        let mut args_map = serde_json::Map::new();
        if let Some(language) = args::coerce_opt_string(&request.language) {
            args_map.insert("language".to_string(), Value::String(language));
        }
        args_map.insert(
            "max_results".to_string(),
            Value::from(args::coerce_u32(&request.max_results, 200)),
        );

        self.run_supervisor_tool("code_structure", "structure", &project, Value::Object(args_map))
            .await
    }

    #[tool(description = "Trace the blast radius of a change to a symbol or file within a project.")]
    async fn impact_analysis(
        &self,
        Parameters(request): Parameters<ImpactAnalysisRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let project = match args::require_string(&request.project, "project") {
            Ok(project) => project,
            Err(error) => return Ok(error_result("impact_analysis", error)),
        };
        let target = match args::require_string(&request.target, "target") {
            Ok(target) => target,
            Err(error) => return Ok(error_result("impact_analysis", error)),
        };

        let mut args_map = serde_json::Map::new();
        args_map.insert("target".to_string(), Value::String(target));
        if let Some(language) = args::coerce_opt_string(&request.language) {
            args_map.insert("language".to_string(), Value::String(language));
        }
        args_map.insert(
            "max_depth".to_string(),
            Value::from(args::coerce_u32(&request.max_depth, 5)),
        );

        self.run_supervisor_tool("impact_analysis", "impact", &project, Value::Object(args_map))
            .await
    }

    #[tool(description = "Compute the impact of the project's uncommitted or recent changes.")]
    async fn change_impact(
        &self,
        Parameters(request): Parameters<ChangeImpactRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let project = match args::require_string(&request.project, "project") {
            Ok(project) => project,
            Err(error) => return Ok(error_result("change_impact", error)),
        };

        let mut args_map = serde_json::Map::new();
        if let Some(language) = args::coerce_opt_string(&request.language) {
            args_map.insert("language".to_string(), Value::String(language));
        }
        let use_git = args::coerce_bool(&request.use_git, false);
        args_map.insert("use_git".to_string(), Value::Bool(use_git));
        if let Some(git_base) = args::coerce_opt_string(&request.git_base) {
            args_map.insert("git_base".to_string(), Value::String(git_base));
        }

        self.run_supervisor_tool("change_impact", "change_impact", &project, Value::Object(args_map))
            .await
    }

    #[tool(
        description = "Map dependency edges across every project in a monorepo. NOTE: `root` is carried as the supervisor's `project` slot, a documented convention deviation."
    )]
    async fn cross_project_deps(
        &self,
        Parameters(request): Parameters<CrossProjectDepsRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let root = match args::require_string(&request.root, "root") {
            Ok(root) => root,
            Err(error) => return Ok(error_result("cross_project_deps", error)),
        };

        self.run_supervisor_tool(
            "cross_project_deps",
            "cross_project_deps",
            &root,
            Value::Object(serde_json::Map::new()),
        )
        .await
    }

    #[tool(description = "Detect recurring structural or idiomatic patterns in a project.")]
    async fn detect_patterns(
        &self,
        Parameters(request): Parameters<DetectPatternsRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let project = match args::require_string(&request.project, "project") {
            Ok(project) => project,
            Err(error) => return Ok(error_result("detect_patterns", error)),
        };

        let mut args_map = serde_json::Map::new();
        if let Some(language) = args::coerce_opt_string(&request.language) {
            args_map.insert("language".to_string(), Value::String(language));
        }

        self.run_supervisor_tool("detect_patterns", "detect_patterns", &project, Value::Object(args_map))
            .await
    }

    #[tool(description = "Summarize changes since a baseline git ref as a live diff.")]
    async fn live_changes(
        &self,
        Parameters(request): Parameters<LiveChangesRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let project = match args::require_string(&request.project, "project") {
            Ok(project) => project,
            Err(error) => return Ok(error_result("live_changes", error)),
        };

        let mut args_map = serde_json::Map::new();
        if let Some(baseline) = args::coerce_opt_string(&request.baseline) {
            args_map.insert("baseline".to_string(), Value::String(baseline));
        }
        if let Some(language) = args::coerce_opt_string(&request.language) {
            args_map.insert("language".to_string(), Value::String(language));
        }

        self.run_supervisor_tool("live_changes", "live_changes", &project, Value::Object(args_map))
            .await
    }
}

impl CodemapServer {
    /// Shared supervisor-backed tool body: run `command` and shape the
    /// result or error as a tool result.
    ///
    /// Each call gets its own cancellation token: nothing ever fires it
    /// today, since the MCP stdio transport in this pack does not surface
    /// per-request cancellation, but `Supervisor::run` already honors one
    /// at every suspension point if a future caller wires one in.
    async fn run_supervisor_tool(
        &self,
        tool_name: &str,
        command: &str,
        project: &str,
        args: Value,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(tool = tool_name, command, project, "dispatching supervisor-backed tool");
        let token = CancellationToken::new();
        match self.supervisor.run(command, project, args, &token).await {
            Ok(result) => Ok(json_result(&result)),
            Err(source) => {
                error!(tool = tool_name, error = %source, "supervisor-backed tool call failed");
                Ok(error_result(tool_name, CodemapError::from(source)))
            }
        }
    }
}

impl ServerHandler for CodemapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            server_info: Implementation {
                name: "codemap".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Structural questions about a multi-project workspace: which projects exist, \
                 which project owns a path, what calls what, which tests cover which changes, \
                 and which patterns appear in which files."
                    .to_string(),
            ),
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let tcc = ToolCallContext::new(self, request, context);
        self.tool_router.call(tcc).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str, path: &str) -> Project {
        Project {
            name: name.to_string(),
            path: PathBuf::from(path),
            language: registry::Language::Unknown,
            group: String::new(),
            git_branch: String::new(),
        }
    }

    fn agent(project: &str) -> Agent {
        Agent {
            agent_id: "a1".to_string(),
            name: "agent-1".to_string(),
            status: "active".to_string(),
            project: project.to_string(),
            project_path: None,
            session_id: None,
            last_seen: None,
            reservations: Vec::new(),
        }
    }

    #[test]
    fn match_project_prefers_exact_name() {
        let projects = vec![project("projA", "/w/G1/projA"), project("projB", "/w/G2/projB")];
        let found = match_project(&agent("projB"), &projects).unwrap();
        assert_eq!(found.name, "projB");
    }

    #[test]
    fn match_project_falls_back_to_substring() {
        let projects = vec![project("projA", "/w/G1/projA")];
        let found = match_project(&agent("/w/G1/projA/src"), &projects).unwrap();
        assert_eq!(found.name, "projA");
    }

    #[test]
    fn match_project_returns_none_when_unmatched() {
        let projects = vec![project("projA", "/w/G1/projA")];
        assert!(match_project(&agent("totally-unrelated"), &projects).is_none());
    }
}
