//! Call pipeline: an ordered list of middlewares in front of an endpoint.
//!
//! The chain is composed once when the server is built. Each middleware gets
//! the request plus a [`Next`] continuation and either calls `next.run(..)` or
//! returns a terminal outcome itself.

pub mod enforce;
pub mod inject;

use std::{collections::BTreeSet, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use rmcp::model::{CallToolResult, JsonObject};
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

pub use enforce::RootEnforcementMiddleware;
pub use inject::RootInjectionMiddleware;

use crate::{
    audit::AuditLog,
    core::metrics::ScopeMetrics,
    roots::{Root, RootResolver, RootsSession},
};

/// Method name of tool invocations.
pub const TOOLS_CALL: &str = "tools/call";

/// Result of running a call through the pipeline.
///
/// Domain failures (access denied, bad arguments) are `Ok` results with
/// `is_error` set; `Err` is reserved for protocol errors.
pub type CallOutcome = Result<CallToolResult, rmcp::ErrorData>;

/// One inbound call as seen by the middlewares.
pub struct ToolRequest {
    pub method: String,
    pub tool_name: String,
    pub arguments: JsonObject,
    /// Client session able to list roots, if the runtime provided one.
    pub session: Option<Arc<dyn RootsSession>>,
    pub cancel: CancellationToken,
    /// Parameters the tool's input schema declares. `None` when unknown, in
    /// which case every parameter counts as accepted.
    pub params: Option<BTreeSet<String>>,
    /// Roots resolved for this call. Filled on first use, dropped with the call.
    roots: OnceCell<Vec<Root>>,
}

impl ToolRequest {
    /// A `tools/call` request with no session.
    pub fn call(tool_name: impl Into<String>, arguments: JsonObject) -> Self {
        Self {
            method: TOOLS_CALL.to_string(),
            tool_name: tool_name.into(),
            arguments,
            session: None,
            cancel: CancellationToken::new(),
            params: None,
            roots: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: Arc<dyn RootsSession>) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = Some(params.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the tool takes argument `key`.
    pub fn accepts_param(&self, key: &str) -> bool {
        self.params.as_ref().map_or(true, |p| p.contains(key))
    }

    pub fn is_tool_call(&self) -> bool {
        self.method == TOOLS_CALL
    }

    /// Non-empty string argument `key`, if present.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Resolved roots of the session, listed at most once per call.
    ///
    /// Empty when there is no session or the session cannot provide roots.
    pub async fn roots(&self, resolver: &RootResolver) -> &[Root] {
        self.roots
            .get_or_init(|| async {
                match &self.session {
                    Some(session) => resolver.resolve_session(session.as_ref(), &self.cancel).await,
                    None => Vec::new(),
                }
            })
            .await
    }
}

impl fmt::Debug for ToolRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRequest")
            .field("method", &self.method)
            .field("tool_name", &self.tool_name)
            .field("arguments", &self.arguments)
            .field("params", &self.params)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

/// A step in the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: ToolRequest, next: Next<'_>) -> CallOutcome;
}

/// What the pipeline finally calls.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, request: ToolRequest) -> CallOutcome;
}

#[async_trait]
impl<F, Fut> Endpoint for F
where
    F: Fn(ToolRequest) -> Fut + Send + Sync,
    Fut: Future<Output = CallOutcome> + Send,
{
    async fn call(&self, request: ToolRequest) -> CallOutcome {
        (self)(request).await
    }
}

/// The remainder of the pipeline after the current middleware.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub async fn run(self, request: ToolRequest) -> CallOutcome {
        match self.middlewares.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    middlewares: rest,
                    endpoint: self.endpoint,
                };
                current.handle(request, next).await
            }
            None => self.endpoint.call(request).await,
        }
    }
}

/// Ordered middlewares; the first one added runs first.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injection followed by enforcement, sharing one resolver.
    pub fn root_scoping(
        resolver: RootResolver,
        audit: Arc<AuditLog>,
        metrics: Arc<ScopeMetrics>,
    ) -> Self {
        Self::new()
            .with(Arc::new(RootInjectionMiddleware::new(
                resolver.clone(),
                audit.clone(),
                metrics.clone(),
            )))
            .with(Arc::new(RootEnforcementMiddleware::new(
                resolver, audit, metrics,
            )))
    }

    #[must_use]
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    pub async fn run(&self, request: ToolRequest, endpoint: &dyn Endpoint) -> CallOutcome {
        Next {
            middlewares: &self.middlewares,
            endpoint,
        }
        .run(request)
        .await
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("middlewares", &self.names())
            .finish()
    }
}
