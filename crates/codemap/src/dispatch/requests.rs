//! Tool argument shapes.
//!
//! Every field is an untyped `serde_json::Value`: MCP argument maps are
//! JSON with no compile-time contract, and a caller sending a number where
//! a string is expected must not fail deserialization outright — it falls
//! through to [`super::args`]'s coercion helpers instead.

use rmcp::schemars;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProjectRegistryRequest {
    #[schemars(description = "Workspace root to scan; defaults to the configured root")]
    pub root: Option<Value>,
    #[schemars(description = "Bypass the registry cache and force a fresh scan")]
    pub refresh: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ResolveProjectRequest {
    #[schemars(description = "Filesystem path to resolve to its owning project")]
    pub path: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AgentMapRequest {
    #[schemars(description = "Workspace root to scan; defaults to the configured root")]
    pub root: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CodeStructureRequest {
    #[schemars(description = "Absolute path of the project to analyze")]
    pub project: Option<Value>,
    #[schemars(description = "Language hint override")]
    pub language: Option<Value>,
    #[schemars(description = "Maximum number of results to return")]
    pub max_results: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImpactAnalysisRequest {
    #[schemars(description = "Absolute path of the project to analyze")]
    pub project: Option<Value>,
    #[schemars(description = "Symbol or file whose impact should be traced")]
    pub target: Option<Value>,
    #[schemars(description = "Language hint override")]
    pub language: Option<Value>,
    #[schemars(description = "Maximum traversal depth")]
    pub max_depth: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ChangeImpactRequest {
    #[schemars(description = "Absolute path of the project to analyze")]
    pub project: Option<Value>,
    #[schemars(description = "Language hint override")]
    pub language: Option<Value>,
    #[schemars(description = "Derive the changed-file set from git instead of the working tree")]
    pub use_git: Option<Value>,
    #[schemars(description = "Git ref to diff against when `use_git` is set")]
    pub git_base: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CrossProjectDepsRequest {
    #[schemars(description = "Absolute path of the monorepo root")]
    pub root: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DetectPatternsRequest {
    #[schemars(description = "Absolute path of the project to analyze")]
    pub project: Option<Value>,
    #[schemars(description = "Language hint override")]
    pub language: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LiveChangesRequest {
    #[schemars(description = "Absolute path of the project to analyze")]
    pub project: Option<Value>,
    #[schemars(description = "Baseline git ref to diff against")]
    pub baseline: Option<Value>,
    #[schemars(description = "Language hint override")]
    pub language: Option<Value>,
}
