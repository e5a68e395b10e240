//! Supervised cross-language IPC core for a multi-project code-mapping MCP
//! server: a persistent analyzer sidecar, a project registry and path
//! resolver, a content-addressed result cache, and the tool dispatch layer
//! that ties them together.

#![forbid(unsafe_code)]

pub mod agent_overlay;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod supervisor;

pub use dispatch::CodemapServer;
