//! Capability-scoped MCP tool gateway.
//!
//! ## Modules
//!
//! - [`inventory`]: Catalog descriptors filtered into immutable snapshots
//! - [`roots`]: Client root URIs and their owner/repo targets
//! - [`middleware`]: Call pipeline that injects and enforces root scope
//! - [`dynamic`]: Runtime toolset enable/disable
//! - [`core`]: Configuration, handler registry, metrics, and the MCP server
//!
//! ## Shared Types
//!
//! - [`ToolAnnotations`]: Tool behavior hints (read_only, destructive, etc.)
//! - [`AuditLog`]: Record of injections and scope denials

// Shared types (used across modules)
pub mod annotations;
pub mod audit;
pub mod error;

// Subsystems
pub mod core;
pub mod dynamic;
pub mod inventory;
pub mod middleware;
pub mod roots;
pub mod tools;

pub use core::{
    GatewayConfig, HandlerRegistry, MetricsSnapshot, RepoAccessChecker, ScopeMetrics,
    ScopedServer, ScopedServerBuilder, ToolConfig, ToolContext, ToolHandler,
};

pub use annotations::ToolAnnotations;
pub use audit::{AuditEntry, AuditKind, AuditLog};
pub use dynamic::{DynamicToolsets, ToolsetStatus, ToolsetToolInfo};
pub use error::{McpError, McpResult, RootParseError};
pub use inventory::{
    Inventory, InventoryBuilder, LiveInventory, PromptDescriptor, ResourceDescriptor,
    ToolDescriptor, ToolsetMetadata,
};
pub use middleware::{
    CallOutcome, Middleware, MiddlewareChain, RootEnforcementMiddleware, RootInjectionMiddleware,
    ToolRequest,
};
pub use roots::{parse_root_uri, DeclaredRoot, Root, RootResolver, RootsSession};
