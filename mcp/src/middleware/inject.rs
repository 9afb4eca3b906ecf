//! Fills missing `owner`/`repo` arguments from the session's roots.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{CallOutcome, Middleware, Next, ToolRequest};
use crate::{
    audit::AuditLog,
    core::metrics::ScopeMetrics,
    roots::{distinct_owners, split_root_uri, Root, RootResolver},
};

/// Injects `owner` (and `repo` when unambiguous) into calls that omit them.
///
/// Only absent keys the tool declares are filled. Nothing happens when the
/// roots span more than one owner, and `repo` is left alone unless exactly one
/// repo-level root exists.
pub struct RootInjectionMiddleware {
    resolver: RootResolver,
    audit: Arc<AuditLog>,
    metrics: Arc<ScopeMetrics>,
}

impl RootInjectionMiddleware {
    pub fn new(resolver: RootResolver, audit: Arc<AuditLog>, metrics: Arc<ScopeMetrics>) -> Self {
        Self {
            resolver,
            audit,
            metrics,
        }
    }

    /// Values as spelled in the root URI, falling back to the normalized ones.
    fn spelled(&self, root: &Root) -> (String, String) {
        split_root_uri(&root.uri, self.resolver.host())
            .unwrap_or_else(|_| (root.owner.clone(), root.repo.clone()))
    }
}

/// What injection would fill for `roots`, ignoring the current arguments.
/// `None` when the roots span several owners.
pub(crate) fn injectable<'r>(roots: &'r [Root]) -> Option<(&'r Root, Option<&'r Root>)> {
    let first = roots.first()?;
    if distinct_owners(roots).len() > 1 {
        return None;
    }
    let mut repo_roots = roots.iter().filter(|r| !r.is_owner_wide());
    let single_repo = match (repo_roots.next(), repo_roots.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    };
    Some((first, single_repo))
}

#[async_trait]
impl Middleware for RootInjectionMiddleware {
    fn name(&self) -> &'static str {
        "root_injection"
    }

    async fn handle(&self, mut request: ToolRequest, next: Next<'_>) -> CallOutcome {
        if !request.is_tool_call() || request.session.is_none() {
            return next.run(request).await;
        }
        let wants_owner =
            request.accepts_param("owner") && !request.arguments.contains_key("owner");
        let wants_repo =
            request.accepts_param("repo") && !request.arguments.contains_key("repo");
        if !wants_owner && !wants_repo {
            return next.run(request).await;
        }

        let (owner, repo) = {
            let roots = request.roots(&self.resolver).await;
            if roots.is_empty() {
                return next.run(request).await;
            }
            let Some((owner_root, repo_root)) = injectable(roots) else {
                debug!(
                    tool = %request.tool_name,
                    owners = distinct_owners(roots).len(),
                    "Roots span multiple owners, skipping injection"
                );
                return next.run(request).await;
            };
            let owner = self.spelled(owner_root).0;
            let repo = repo_root.map(|r| self.spelled(r).1);
            (owner, repo)
        };

        let mut injected_owner = None;
        let mut injected_repo = None;

        if wants_owner {
            request
                .arguments
                .insert("owner".to_string(), Value::String(owner.clone()));
            injected_owner = Some(owner);
        }
        if let Some(repo) = repo.filter(|_| wants_repo) {
            request
                .arguments
                .insert("repo".to_string(), Value::String(repo.clone()));
            injected_repo = Some(repo);
        }

        if injected_owner.is_some() || injected_repo.is_some() {
            info!(
                tool = %request.tool_name,
                owner = injected_owner.as_deref().unwrap_or_default(),
                repo = injected_repo.as_deref().unwrap_or_default(),
                "Injected call arguments from roots"
            );
            self.audit.record_injection(
                &request.tool_name,
                injected_owner.as_deref(),
                injected_repo.as_deref(),
            );
            self.metrics.record_injection();
        }

        next.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use rmcp::model::{CallToolResult, Content, JsonObject};
    use serde_json::json;

    use super::*;
    use crate::{
        middleware::MiddlewareChain,
        roots::{resolve_roots, DeclaredRoot, StaticRootsSession},
    };

    fn middleware() -> (RootInjectionMiddleware, Arc<AuditLog>, Arc<ScopeMetrics>) {
        let audit = Arc::new(AuditLog::new());
        let metrics = Arc::new(ScopeMetrics::new());
        (
            RootInjectionMiddleware::new(RootResolver::default(), audit.clone(), metrics.clone()),
            audit,
            metrics,
        )
    }

    async fn echo(request: ToolRequest) -> CallOutcome {
        Ok(CallToolResult::success(vec![Content::text(
            Value::Object(request.arguments).to_string(),
        )]))
    }

    async fn run(roots: &[&str], args: Value) -> (Value, Arc<AuditLog>) {
        let arguments: JsonObject = serde_json::from_value(args).unwrap();
        run_request(roots, ToolRequest::call("t", arguments)).await
    }

    async fn run_request(roots: &[&str], request: ToolRequest) -> (Value, Arc<AuditLog>) {
        let (mw, audit, _) = middleware();
        let chain = MiddlewareChain::new().with(Arc::new(mw));
        let session = Arc::new(StaticRootsSession::from_uris(roots.iter().copied()));
        let result = chain
            .run(request.with_session(session), &echo)
            .await
            .unwrap();
        let text = result.content[0].as_text().unwrap().text.clone();
        (serde_json::from_str(&text).unwrap(), audit)
    }

    #[tokio::test]
    async fn test_single_repo_root_fills_both() {
        let (args, audit) = run(
            &["https://github.com/octocat/Hello-World"],
            json!({"state": "open"}),
        )
        .await;
        assert_eq!(
            args,
            json!({"owner": "octocat", "repo": "Hello-World", "state": "open"})
        );
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn test_owner_root_fills_owner_only() {
        let (args, _) = run(&["https://github.com/myorg"], json!({"repo": "x"})).await;
        assert_eq!(args, json!({"owner": "myorg", "repo": "x"}));
    }

    #[tokio::test]
    async fn test_present_values_never_overwritten() {
        let (args, audit) = run(
            &["https://github.com/octocat/hello-world"],
            json!({"owner": "someone", "repo": "else"}),
        )
        .await;
        assert_eq!(args, json!({"owner": "someone", "repo": "else"}));
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_owners_no_mutation() {
        let (args, audit) = run(
            &["https://github.com/org-a/repo", "https://github.com/org-b/repo"],
            json!({}),
        )
        .await;
        assert_eq!(args, json!({}));
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_two_repo_roots_leave_repo_alone() {
        let (args, _) = run(
            &["https://github.com/myorg/a", "https://github.com/myorg/b"],
            json!({}),
        )
        .await;
        assert_eq!(args, json!({"owner": "myorg"}));
    }

    #[tokio::test]
    async fn test_owner_root_plus_repo_root() {
        let (args, _) = run(
            &["https://github.com/myorg", "https://github.com/MyOrg/main-app"],
            json!({}),
        )
        .await;
        assert_eq!(args, json!({"owner": "myorg", "repo": "main-app"}));
    }

    #[tokio::test]
    async fn test_only_declared_params_are_filled() {
        let args: JsonObject = serde_json::from_value(json!({"query": "is:open"})).unwrap();
        let (args, audit) = run_request(
            &["https://github.com/octocat/Hello-World"],
            ToolRequest::call("search_issues", args).with_params(["query"]),
        )
        .await;
        assert_eq!(args, json!({"query": "is:open"}));
        assert!(audit.is_empty());

        let (args, _) = run_request(
            &["https://github.com/octocat/Hello-World"],
            ToolRequest::call("list_repo_owner", JsonObject::new()).with_params(["owner", "page"]),
        )
        .await;
        assert_eq!(args, json!({"owner": "octocat"}));
    }

    #[tokio::test]
    async fn test_no_roots_no_mutation() {
        let (args, audit) = run(&[], json!({"state": "open"})).await;
        assert_eq!(args, json!({"state": "open"}));
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_non_call_and_sessionless_requests_pass_through() {
        let (mw, _, metrics) = middleware();
        let chain = MiddlewareChain::new().with(Arc::new(mw));
        let session = Arc::new(StaticRootsSession::from_uris(["https://github.com/a/b"]));

        let listed = chain
            .run(
                ToolRequest::call("t", JsonObject::new())
                    .with_method("tools/list")
                    .with_session(session),
                &echo,
            )
            .await
            .unwrap();
        assert_eq!(listed.content[0].as_text().unwrap().text, "{}");

        let bare = chain
            .run(ToolRequest::call("t", JsonObject::new()), &echo)
            .await
            .unwrap();
        assert_eq!(bare.content[0].as_text().unwrap().text, "{}");
        assert_eq!(metrics.snapshot().injections, 0);
    }

    #[test]
    fn test_injectable() {
        let roots = resolve_roots(
            &[
                DeclaredRoot::new("https://github.com/o/a"),
                DeclaredRoot::new("https://github.com/O/a"),
            ],
            "",
        );
        // Duplicate repo roots still count as two
        let (owner, repo) = injectable(&roots).unwrap();
        assert_eq!(owner.owner, "o");
        assert!(repo.is_none());
        assert!(injectable(&[]).is_none());
    }
}
