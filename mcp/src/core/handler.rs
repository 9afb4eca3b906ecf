//! Tool handler seam and per-call context.
//!
//! The remote-service calls behind each tool live outside this crate. The
//! embedding application registers a [`ToolHandler`] per tool name.

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use rmcp::model::JsonObject;
use tokio_util::sync::CancellationToken;

use crate::{inventory::Inventory, middleware::CallOutcome, roots::RootsSession};

/// Whether the caller may read a repository (lockdown mode).
#[async_trait]
pub trait RepoAccessChecker: Send + Sync {
    async fn can_read(&self, owner: &str, repo: &str) -> bool;
}

/// Grants every read.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllRepos;

#[async_trait]
impl RepoAccessChecker for AllowAllRepos {
    async fn can_read(&self, _owner: &str, _repo: &str) -> bool {
        true
    }
}

/// Everything a handler gets besides its arguments.
#[derive(Clone)]
pub struct ToolContext {
    pub tool_name: String,
    pub session: Option<Arc<dyn RootsSession>>,
    /// Fires when the client cancels the call. Handlers should stop early.
    pub cancel: CancellationToken,
    pub repo_access: Arc<dyn RepoAccessChecker>,
    /// The inventory snapshot the call was dispatched against.
    pub inventory: Arc<Inventory>,
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("tool_name", &self.tool_name)
            .field("has_session", &self.session.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: ToolContext, arguments: JsonObject) -> CallOutcome;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(ToolContext, JsonObject) -> Fut + Send + Sync,
    Fut: Future<Output = CallOutcome> + Send,
{
    async fn call(&self, ctx: ToolContext, arguments: JsonObject) -> CallOutcome {
        (self)(ctx, arguments).await
    }
}

/// Tool name -> handler. Aliases are resolved before lookup, so only
/// canonical names are registered.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn ToolHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`, returning the handler it replaced.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.insert(name.into(), handler)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).map(|h| Arc::clone(h.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
