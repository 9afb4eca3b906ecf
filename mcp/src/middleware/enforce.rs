//! Rejects calls whose `owner`/`repo` fall outside the session's roots.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Content};
use tracing::info;

use super::{CallOutcome, Middleware, Next, ToolRequest};
use crate::{
    audit::AuditLog,
    core::metrics::ScopeMetrics,
    roots::{distinct_owners, Root, RootResolver},
};

/// Why a call was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeViolation {
    Owner {
        owner: String,
        allowed_owners: Vec<String>,
    },
    Repo {
        owner: String,
        repo: String,
        allowed_repos: Vec<String>,
    },
}

impl ScopeViolation {
    pub fn message(&self) -> String {
        match self {
            ScopeViolation::Owner {
                owner,
                allowed_owners,
            } => format!(
                "root enforcement: owner {owner:?} is not within configured roots (allowed owners: {})",
                quoted(allowed_owners)
            ),
            ScopeViolation::Repo {
                owner,
                repo,
                allowed_repos,
            } => format!(
                "root enforcement: repository {owner:?}/{repo:?} is not within configured roots (allowed repos for {owner:?}: {})",
                quoted(allowed_repos)
            ),
        }
    }
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("{s:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check `owner`/`repo` against `roots`.
///
/// Allowed iff some root has `owner == lower(owner)` and either is owner-wide,
/// or `repo` is absent, or its repo equals `lower(repo)`. An empty root list
/// allows everything.
pub fn check_scope(roots: &[Root], owner: &str, repo: Option<&str>) -> Result<(), ScopeViolation> {
    if roots.is_empty() {
        return Ok(());
    }

    let owner_lower = owner.to_lowercase();
    let owner_roots: Vec<&Root> = roots.iter().filter(|r| r.owner == owner_lower).collect();
    if owner_roots.is_empty() {
        return Err(ScopeViolation::Owner {
            owner: owner.to_string(),
            allowed_owners: distinct_owners(roots).into_iter().map(str::to_string).collect(),
        });
    }

    let Some(repo) = repo else {
        return Ok(());
    };
    if owner_roots.iter().any(|r| r.is_owner_wide()) {
        return Ok(());
    }
    let repo_lower = repo.to_lowercase();
    if owner_roots.iter().any(|r| r.repo == repo_lower) {
        return Ok(());
    }

    let allowed_repos: BTreeSet<&str> = owner_roots.iter().map(|r| r.repo.as_str()).collect();
    Err(ScopeViolation::Repo {
        owner: owner.to_string(),
        repo: repo.to_string(),
        allowed_repos: allowed_repos.into_iter().map(str::to_string).collect(),
    })
}

/// Refuses out-of-scope calls with a recoverable tool error.
///
/// Runs after injection, so injected values are checked like any others.
pub struct RootEnforcementMiddleware {
    resolver: RootResolver,
    audit: Arc<AuditLog>,
    metrics: Arc<ScopeMetrics>,
}

impl RootEnforcementMiddleware {
    pub fn new(resolver: RootResolver, audit: Arc<AuditLog>, metrics: Arc<ScopeMetrics>) -> Self {
        Self {
            resolver,
            audit,
            metrics,
        }
    }

    fn deny(&self, request: &ToolRequest, violation: &ScopeViolation) -> CallOutcome {
        let message = violation.message();
        match violation {
            ScopeViolation::Owner { owner, .. } => {
                info!(tool = %request.tool_name, owner = %owner, "{message}");
                self.audit
                    .record_denial(&request.tool_name, owner, None, &message);
                self.metrics.record_owner_denial(&request.tool_name);
            }
            ScopeViolation::Repo { owner, repo, .. } => {
                info!(tool = %request.tool_name, owner = %owner, repo = %repo, "{message}");
                self.audit
                    .record_denial(&request.tool_name, owner, Some(repo), &message);
                self.metrics.record_repo_denial(&request.tool_name);
            }
        }
        Ok(CallToolResult::error(vec![Content::text(message)]))
    }
}

#[async_trait]
impl Middleware for RootEnforcementMiddleware {
    fn name(&self) -> &'static str {
        "root_enforcement"
    }

    async fn handle(&self, request: ToolRequest, next: Next<'_>) -> CallOutcome {
        if !request.is_tool_call() || request.session.is_none() {
            return next.run(request).await;
        }
        // Tools without an owner argument are not scoped.
        let Some(owner) = request.str_arg("owner") else {
            return next.run(request).await;
        };

        let roots = request.roots(&self.resolver).await;
        let verdict = check_scope(roots, owner, request.str_arg("repo"));

        match verdict {
            Ok(()) => next.run(request).await,
            Err(violation) => self.deny(&request, &violation),
        }
    }
}

#[cfg(test)]
mod tests {
    use rmcp::model::JsonObject;
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        middleware::MiddlewareChain,
        roots::{resolve_roots, DeclaredRoot, StaticRootsSession},
    };

    fn roots(uris: &[&str]) -> Vec<Root> {
        let declared: Vec<DeclaredRoot> = uris.iter().map(|u| DeclaredRoot::new(*u)).collect();
        resolve_roots(&declared, "github.com")
    }

    async fn allow(_request: ToolRequest) -> CallOutcome {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }

    async fn call(uris: &[&str], args: Value) -> (CallToolResult, Arc<ScopeMetrics>) {
        let audit = Arc::new(AuditLog::new());
        let metrics = Arc::new(ScopeMetrics::new());
        let chain = MiddlewareChain::new().with(Arc::new(RootEnforcementMiddleware::new(
            RootResolver::default(),
            audit,
            metrics.clone(),
        )));
        let arguments: JsonObject = serde_json::from_value(args).unwrap();
        let session = Arc::new(StaticRootsSession::from_uris(uris.iter().copied()));
        let result = chain
            .run(ToolRequest::call("t", arguments).with_session(session), &allow)
            .await
            .unwrap();
        (result, metrics)
    }

    fn is_denied(result: &CallToolResult) -> bool {
        result.is_error == Some(true)
    }

    fn text(result: &CallToolResult) -> String {
        result.content[0].as_text().unwrap().text.clone()
    }

    #[test]
    fn test_check_scope_formula() {
        let set = roots(&[
            "https://github.com/myorg",
            "https://github.com/other/App",
            "https://github.com/other/lib",
        ]);
        assert!(check_scope(&set, "MyOrg", Some("anything")).is_ok());
        assert!(check_scope(&set, "other", Some("APP")).is_ok());
        assert!(check_scope(&set, "other", None).is_ok());
        assert_eq!(
            check_scope(&set, "other", Some("tool")),
            Err(ScopeViolation::Repo {
                owner: "other".to_string(),
                repo: "tool".to_string(),
                allowed_repos: vec!["app".to_string(), "lib".to_string()],
            })
        );
        assert!(matches!(
            check_scope(&set, "stranger", None),
            Err(ScopeViolation::Owner { .. })
        ));
        assert!(check_scope(&[], "anyone", Some("anything")).is_ok());
    }

    #[test]
    fn test_messages() {
        let owner = ScopeViolation::Owner {
            owner: "org-c".to_string(),
            allowed_owners: vec!["org-a".to_string(), "org-b".to_string()],
        };
        assert_eq!(
            owner.message(),
            r#"root enforcement: owner "org-c" is not within configured roots (allowed owners: "org-a", "org-b")"#
        );
        let repo = ScopeViolation::Repo {
            owner: "myorg".to_string(),
            repo: "repo-b".to_string(),
            allowed_repos: vec!["repo-a".to_string()],
        };
        assert_eq!(
            repo.message(),
            r#"root enforcement: repository "myorg"/"repo-b" is not within configured roots (allowed repos for "myorg": "repo-a")"#
        );
    }

    #[tokio::test]
    async fn test_disallowed_owner_is_recoverable_error() {
        let (result, metrics) = call(
            &["https://github.com/org-a/repo", "https://github.com/org-b/repo"],
            json!({"owner": "org-c", "repo": "repo"}),
        )
        .await;
        assert!(is_denied(&result));
        assert!(text(&result).contains("org-c"));
        assert_eq!(metrics.snapshot().owner_denials, 1);
        assert_eq!(metrics.denials_for_tool("t"), 1);
    }

    #[tokio::test]
    async fn test_wrong_repo_same_owner() {
        let (result, metrics) = call(
            &["https://github.com/myorg/repo-a"],
            json!({"owner": "myorg", "repo": "repo-b"}),
        )
        .await;
        assert!(is_denied(&result));
        assert!(text(&result).contains("repo-b"));
        assert_eq!(metrics.snapshot().repo_denials, 1);
    }

    #[tokio::test]
    async fn test_org_root_allows_any_repo() {
        let (result, _) = call(
            &["https://github.com/myorg"],
            json!({"owner": "myorg", "repo": "anything"}),
        )
        .await;
        assert!(!is_denied(&result));
        assert_eq!(text(&result), "ok");
    }

    #[tokio::test]
    async fn test_case_insensitive_match() {
        let (result, _) = call(
            &["https://github.com/octocat/Hello-World"],
            json!({"owner": "OctoCat", "repo": "HELLO-WORLD"}),
        )
        .await;
        assert!(!is_denied(&result));
    }

    #[tokio::test]
    async fn test_pass_through_cases() {
        // No roots
        let (result, _) = call(&[], json!({"owner": "any", "repo": "any"})).await;
        assert!(!is_denied(&result));

        // No owner argument
        let (result, _) = call(&["https://github.com/a/b"], json!({"query": "x"})).await;
        assert!(!is_denied(&result));

        // Owner that is not a usable string
        let (result, _) = call(&["https://github.com/a/b"], json!({"owner": 7})).await;
        assert!(!is_denied(&result));

        // Roots for another host only
        let (result, _) = call(&["https://gitlab.com/a/b"], json!({"owner": "z"})).await;
        assert!(!is_denied(&result));
    }
}
