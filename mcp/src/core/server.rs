//! The MCP server: inventory-backed listings and the scoped call pipeline.

use std::sync::Arc;

use rmcp::{
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, JsonObject, ListPromptsResult,
        ListResourcesResult, ListToolsResult, PaginatedRequestParam, ServerCapabilities,
        ServerInfo, Tool,
    },
    service::RequestContext,
    RoleServer, ServerHandler,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    config::GatewayConfig,
    handler::{AllowAllRepos, HandlerRegistry, RepoAccessChecker, ToolContext, ToolHandler},
    metrics::ScopeMetrics,
};
use crate::{
    audit::AuditLog,
    dynamic::{
        dynamic_tool_descriptors, DisableToolsetTool, DynamicToolsets, EnableToolsetTool,
        GetToolsetToolsTool, ListAvailableToolsetsTool, DISABLE_TOOLSET, ENABLE_TOOLSET,
        GET_TOOLSET_TOOLS, LIST_AVAILABLE_TOOLSETS,
    },
    error::{McpError, McpResult},
    inventory::{Inventory, InventoryBuilder, LiveInventory, ToolDescriptor},
    middleware::{CallOutcome, Endpoint, Middleware, MiddlewareChain, ToolRequest},
    roots::{PeerRootsSession, RootResolver, RootsSession},
    tools::{context_toolset, list_roots_descriptor, ListRootsTool, LIST_ROOTS},
};

const SERVER_NAME: &str = "gh-scope-gateway";

/// Assembles a [`ScopedServer`].
pub struct ScopedServerBuilder {
    inventory: InventoryBuilder,
    handlers: HandlerRegistry,
    resolver: RootResolver,
    roots_mode: bool,
    dynamic_toolsets: bool,
    repo_access: Arc<dyn RepoAccessChecker>,
    audit: Arc<AuditLog>,
    metrics: Arc<ScopeMetrics>,
    extra_middleware: Vec<Arc<dyn Middleware>>,
    name: String,
    version: String,
}

impl ScopedServerBuilder {
    pub fn new(inventory: InventoryBuilder) -> Self {
        Self {
            inventory,
            handlers: HandlerRegistry::new(),
            resolver: RootResolver::default(),
            roots_mode: false,
            dynamic_toolsets: false,
            repo_access: Arc::new(AllowAllRepos),
            audit: Arc::new(AuditLog::new()),
            metrics: Arc::new(ScopeMetrics::new()),
            extra_middleware: Vec::new(),
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Builder with every configured axis applied. Handlers are still
    /// registered by the embedder.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let metrics = Arc::new(ScopeMetrics::new());
        Self::new(config.inventory_builder())
            .resolver(config.resolver().with_metrics(metrics.clone()))
            .roots_mode(config.roots_mode)
            .dynamic_toolsets(config.dynamic_toolsets)
            .audit(Arc::new(AuditLog::with_capacity(config.audit_capacity)))
            .metrics(metrics)
    }

    /// Register the handler for a catalog tool.
    #[must_use]
    pub fn handler(self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.register(name, handler);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: RootResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Inject and enforce owner/repo from client roots.
    #[must_use]
    pub fn roots_mode(mut self, enabled: bool) -> Self {
        self.roots_mode = enabled;
        self
    }

    #[must_use]
    pub fn dynamic_toolsets(mut self, enabled: bool) -> Self {
        self.dynamic_toolsets = enabled;
        self
    }

    #[must_use]
    pub fn repo_access(mut self, checker: Arc<dyn RepoAccessChecker>) -> Self {
        self.repo_access = checker;
        self
    }

    #[must_use]
    pub fn audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<ScopeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Runs after the root middlewares, just before the handler.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.extra_middleware.push(middleware);
        self
    }

    #[must_use]
    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.name = name.into();
        self.version = version.into();
        self
    }

    pub fn build(self) -> McpResult<ScopedServer> {
        let template = self
            .inventory
            .add_toolsets([context_toolset()])
            .add_tools([list_roots_descriptor()]);
        let template = if self.roots_mode {
            template.with_owner_repo_optional(true)
        } else {
            template
        };
        self.handlers.register(
            LIST_ROOTS,
            Arc::new(ListRootsTool::new(self.resolver.clone())),
        );

        let live = LiveInventory::new(template.build()?);

        let mut meta_tools = Vec::new();
        let dynamic = if self.dynamic_toolsets {
            let dynamic = Arc::new(
                DynamicToolsets::new(template, live.clone()).with_metrics(self.metrics.clone()),
            );
            let handlers: [(&str, Arc<dyn ToolHandler>); 4] = [
                (
                    LIST_AVAILABLE_TOOLSETS,
                    Arc::new(ListAvailableToolsetsTool(dynamic.clone())),
                ),
                (
                    GET_TOOLSET_TOOLS,
                    Arc::new(GetToolsetToolsTool(dynamic.clone())),
                ),
                (ENABLE_TOOLSET, Arc::new(EnableToolsetTool(dynamic.clone()))),
                (DISABLE_TOOLSET, Arc::new(DisableToolsetTool(dynamic.clone()))),
            ];
            for (name, handler) in handlers {
                self.handlers.register(name, handler);
            }
            meta_tools = dynamic_tool_descriptors();
            Some(dynamic)
        } else {
            None
        };

        let mut chain = if self.roots_mode {
            MiddlewareChain::root_scoping(
                self.resolver.clone(),
                self.audit.clone(),
                self.metrics.clone(),
            )
        } else {
            MiddlewareChain::new()
        };
        for middleware in self.extra_middleware {
            chain = chain.with(middleware);
        }

        debug!(
            middleware = ?chain.names(),
            handlers = self.handlers.len(),
            dynamic = dynamic.is_some(),
            "Scoped server built"
        );

        Ok(ScopedServer {
            inner: Arc::new(ServerInner {
                live,
                handlers: self.handlers,
                meta_tools,
                chain,
                dynamic,
                repo_access: self.repo_access,
                audit: self.audit,
                metrics: self.metrics,
                name: self.name,
                version: self.version,
            }),
        })
    }
}

struct ServerInner {
    live: LiveInventory,
    handlers: HandlerRegistry,
    /// Always listed; not part of the inventory.
    meta_tools: Vec<ToolDescriptor>,
    chain: MiddlewareChain,
    dynamic: Option<Arc<DynamicToolsets>>,
    repo_access: Arc<dyn RepoAccessChecker>,
    audit: Arc<AuditLog>,
    metrics: Arc<ScopeMetrics>,
    name: String,
    version: String,
}

/// Calls the registered handler once the middlewares let the call through.
struct HandlerEndpoint {
    handler: Arc<dyn ToolHandler>,
    repo_access: Arc<dyn RepoAccessChecker>,
    inventory: Arc<Inventory>,
}

#[async_trait::async_trait]
impl Endpoint for HandlerEndpoint {
    async fn call(&self, request: ToolRequest) -> CallOutcome {
        let ctx = ToolContext {
            tool_name: request.tool_name,
            session: request.session,
            cancel: request.cancel,
            repo_access: self.repo_access.clone(),
            inventory: self.inventory.clone(),
        };
        self.handler.call(ctx, request.arguments).await
    }
}

#[derive(Clone)]
pub struct ScopedServer {
    inner: Arc<ServerInner>,
}

impl ScopedServer {
    pub fn builder(inventory: InventoryBuilder) -> ScopedServerBuilder {
        ScopedServerBuilder::new(inventory)
    }

    /// The current inventory snapshot.
    pub fn inventory(&self) -> Arc<Inventory> {
        self.inner.live.load()
    }

    pub fn dynamic(&self) -> Option<&Arc<DynamicToolsets>> {
        self.inner.dynamic.as_ref()
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.inner.audit
    }

    pub fn metrics(&self) -> &Arc<ScopeMetrics> {
        &self.inner.metrics
    }

    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.inner.chain.names()
    }

    /// Everything `tools/list` returns: the snapshot plus any meta-tools.
    pub fn list_tool_definitions(&self) -> Vec<Tool> {
        let mut tools = self.inventory().list_tools();
        tools.extend(self.inner.meta_tools.iter().map(|d| d.tool.clone()));
        tools
    }

    /// Dispatch one call against the current snapshot.
    ///
    /// Unknown tools are protocol errors; everything else comes back as a
    /// tool result.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        arguments: JsonObject,
        session: Option<Arc<dyn RootsSession>>,
        cancel: CancellationToken,
    ) -> CallOutcome {
        let outcome = self.route(tool_name, arguments, session, cancel).await;
        let failed = match &outcome {
            Ok(result) => result.is_error == Some(true),
            Err(_) => true,
        };
        self.inner.metrics.record_call(failed);
        outcome
    }

    async fn route(
        &self,
        tool_name: &str,
        arguments: JsonObject,
        session: Option<Arc<dyn RootsSession>>,
        cancel: CancellationToken,
    ) -> CallOutcome {
        let snapshot = self.inventory();
        let meta = self.inner.meta_tools.iter().find(|d| d.name() == tool_name);
        let descriptor = match meta {
            Some(descriptor) => descriptor,
            None => match snapshot
                .resolve_name(tool_name)
                .and_then(|name| snapshot.get_tool(name))
            {
                Some(descriptor) => descriptor,
                None => return Err(McpError::ToolNotFound(tool_name.to_string()).into()),
            },
        };
        let canonical = descriptor.name().to_string();
        if canonical != tool_name {
            debug!(alias = %tool_name, tool = %canonical, "Deprecated tool alias used");
        }
        let params = descriptor.property_names();

        let Some(handler) = self.inner.handlers.get(&canonical) else {
            return Err(McpError::HandlerMissing(canonical).into());
        };

        let mut request = ToolRequest::call(canonical, arguments)
            .with_cancel(cancel)
            .with_params(params);
        if let Some(session) = session {
            request = request.with_session(session);
        }
        let endpoint = HandlerEndpoint {
            handler,
            repo_access: self.inner.repo_access.clone(),
            inventory: snapshot,
        };
        self.inner.chain.run(request, &endpoint).await
    }
}

impl ServerHandler for ScopedServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder()
            .enable_prompts()
            .enable_resources()
            .enable_tools()
            .enable_tool_list_changed()
            .build();
        info.server_info.name = self.inner.name.clone();
        info.server_info.version = self.inner.version.clone();
        info.instructions = self.inventory().instructions().map(str::to_string);
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::ErrorData> {
        Ok(ListToolsResult::with_all_items(self.list_tool_definitions()))
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, rmcp::ErrorData> {
        let resources = self
            .inventory()
            .list_resources()
            .into_iter()
            .map(|r| r.no_annotation())
            .collect();
        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, rmcp::ErrorData> {
        Ok(ListPromptsResult::with_all_items(
            self.inventory().list_prompts(),
        ))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let before = self.inventory();
        let session: Arc<dyn RootsSession> = Arc::new(PeerRootsSession::new(context.peer.clone()));

        let outcome = self
            .dispatch(
                &request.name,
                request.arguments.unwrap_or_default(),
                Some(session),
                context.ct.clone(),
            )
            .await;

        if !Arc::ptr_eq(&before, &self.inventory()) {
            if let Err(e) = context.peer.notify_tool_list_changed().await {
                warn!(error = %e, "Failed to send tools/list_changed");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use rmcp::model::Content;
    use serde_json::{json, Value};

    use super::*;
    use crate::{inventory::ToolsetMetadata, roots::StaticRootsSession};

    async fn echo(ctx: ToolContext, args: JsonObject) -> CallOutcome {
        Ok(CallToolResult::success(vec![Content::text(
            json!({"tool": ctx.tool_name, "args": Value::Object(args)}).to_string(),
        )]))
    }

    fn catalog() -> InventoryBuilder {
        let schema = json!({
            "type": "object",
            "properties": {
                "owner": {"type": "string", "description": "Repository owner"},
                "repo": {"type": "string", "description": "Repository name"}
            },
            "required": ["owner", "repo"]
        });
        InventoryBuilder::new()
            .set_toolsets(vec![
                ToolsetMetadata::new("issues", "Issue tools").with_default(true),
                ToolsetMetadata::new("actions", "Workflow tools"),
            ])
            .set_tools(vec![
                ToolDescriptor::new("issues", "list_issues", "List issues", schema.clone())
                    .read_only(),
                ToolDescriptor::new("actions", "list_workflows", "List workflows", schema),
            ])
            .with_deprecated_aliases([("issues_list", "list_issues")])
    }

    fn server(roots_mode: bool, dynamic: bool) -> ScopedServer {
        ScopedServer::builder(catalog())
            .handler("list_issues", Arc::new(echo))
            .handler("list_workflows", Arc::new(echo))
            .roots_mode(roots_mode)
            .dynamic_toolsets(dynamic)
            .build()
            .unwrap()
    }

    fn body(outcome: CallOutcome) -> (bool, Value) {
        let result = outcome.unwrap();
        let text = result.content[0].as_text().unwrap().text.clone();
        (
            result.is_error == Some(true),
            serde_json::from_str(&text).unwrap_or(Value::String(text)),
        )
    }

    fn session(uris: &[&str]) -> Option<Arc<dyn RootsSession>> {
        Some(Arc::new(StaticRootsSession::from_uris(uris.iter().copied())))
    }

    #[tokio::test]
    async fn test_unknown_tool_is_protocol_error() {
        let server = server(false, false);
        let err = server
            .dispatch("nope", JsonObject::new(), None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.message.contains("nope"));
        assert_eq!(server.metrics().snapshot().failed_calls, 1);
    }

    #[tokio::test]
    async fn test_alias_routes_to_canonical_handler() {
        let server = server(false, false);
        let (_, value) = body(
            server
                .dispatch("issues_list", JsonObject::new(), None, CancellationToken::new())
                .await,
        );
        assert_eq!(value["tool"], "list_issues");
    }

    #[tokio::test]
    async fn test_roots_mode_pipeline() {
        let server = server(true, false);
        assert_eq!(
            server.middleware_names(),
            vec!["root_injection", "root_enforcement"]
        );
        // Schemas advertise owner/repo as optional
        let tool = server.inventory().get_tool("list_issues").cloned().unwrap();
        assert!(tool.required_fields().is_empty());

        let (is_error, value) = body(
            server
                .dispatch(
                    "list_issues",
                    JsonObject::new(),
                    session(&["https://github.com/octocat/Hello-World"]),
                    CancellationToken::new(),
                )
                .await,
        );
        assert!(!is_error);
        assert_eq!(value["args"], json!({"owner": "octocat", "repo": "Hello-World"}));

        let args: JsonObject = serde_json::from_value(json!({"owner": "evil"})).unwrap();
        let (is_error, value) = body(
            server
                .dispatch(
                    "list_issues",
                    args,
                    session(&["https://github.com/octocat/Hello-World"]),
                    CancellationToken::new(),
                )
                .await,
        );
        assert!(is_error);
        assert!(value.as_str().unwrap().contains("evil"));
        assert_eq!(server.audit().denials(10).len(), 1);
    }

    #[tokio::test]
    async fn test_without_roots_mode_nothing_is_injected() {
        let server = server(false, false);
        assert!(server.middleware_names().is_empty());
        let (_, value) = body(
            server
                .dispatch(
                    "list_issues",
                    JsonObject::new(),
                    session(&["https://github.com/octocat/Hello-World"]),
                    CancellationToken::new(),
                )
                .await,
        );
        assert_eq!(value["args"], json!({}));
    }

    #[tokio::test]
    async fn test_dynamic_meta_tools() {
        let server = server(false, true);
        let names: Vec<String> = server
            .list_tool_definitions()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        assert!(names.contains(&"enable_toolset".to_string()));
        assert!(!server.inventory().has_tool("list_workflows"));

        let args: JsonObject = serde_json::from_value(json!({"toolset": "actions"})).unwrap();
        let (is_error, _) = body(
            server
                .dispatch("enable_toolset", args, None, CancellationToken::new())
                .await,
        );
        assert!(!is_error);
        assert!(server.inventory().has_tool("list_workflows"));
        assert_eq!(server.metrics().snapshot().inventory_swaps, 1);
    }

    #[tokio::test]
    async fn test_list_roots_needs_insiders() {
        let server = server(false, false);
        assert!(!server.inventory().has_tool(LIST_ROOTS));

        let insiders = ScopedServer::builder(catalog().with_insiders_mode(true))
            .build()
            .unwrap();
        assert!(insiders.inventory().has_tool(LIST_ROOTS));
        let (_, value) = body(
            insiders
                .dispatch(
                    LIST_ROOTS,
                    JsonObject::new(),
                    session(&["https://github.com/myorg"]),
                    CancellationToken::new(),
                )
                .await,
        );
        assert_eq!(value[0]["owner"], "myorg");
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let server = ScopedServer::builder(catalog()).build().unwrap();
        let err = server
            .dispatch("list_issues", JsonObject::new(), None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.message.contains("No handler registered"));
    }

    #[test]
    fn test_get_info() {
        let server = ScopedServer::builder(
            catalog().set_toolsets(vec![ToolsetMetadata::new("issues", "Issue tools")
                .with_default(true)
                .with_instructions("Check for duplicates before creating issues.")]),
        )
        .build()
        .unwrap();
        let info = server.get_info();
        assert_eq!(info.server_info.name, "gh-scope-gateway");
        assert!(info.capabilities.tools.is_some());
        // Instructions are off unless the builder asks for them
        assert!(info.instructions.is_none());
    }
}
