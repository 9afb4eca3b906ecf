//! Server runtime: configuration, handler registry, metrics, and the MCP server.

pub mod config;
pub mod handler;
pub mod metrics;
pub mod server;

pub use config::{
    clean_tools, resolve_enabled_toolsets, CatalogConfig, GatewayConfig, LogConfig, ToolConfig,
};
pub use handler::{AllowAllRepos, HandlerRegistry, RepoAccessChecker, ToolContext, ToolHandler};
pub use metrics::{MetricsSnapshot, ScopeMetrics};
pub use server::{ScopedServer, ScopedServerBuilder};
