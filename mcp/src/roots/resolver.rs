//! Turns a session's declared roots into validated [`Root`]s.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    parser::parse_root_uri,
    session::RootsSession,
    types::{DeclaredRoot, Root, DEFAULT_HOST},
};
use crate::{
    core::metrics::ScopeMetrics,
    error::{McpError, McpResult},
};

const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse declared roots, keeping those that point at `host`.
///
/// Entries that fail to parse (other forges, local paths, junk) are skipped.
/// Order is preserved and duplicates are kept.
pub fn resolve_roots(roots: &[DeclaredRoot], host: &str) -> Vec<Root> {
    roots
        .iter()
        .filter_map(|declared| match parse_root_uri(&declared.uri, host) {
            Ok((owner, repo)) => Some(Root {
                owner,
                repo,
                uri: declared.uri.clone(),
                name: declared.name.clone(),
            }),
            Err(e) => {
                debug!(uri = %declared.uri, error = %e, "Skipping root");
                None
            }
        })
        .collect()
}

/// Distinct owners across `roots`.
pub fn distinct_owners(roots: &[Root]) -> BTreeSet<&str> {
    roots.iter().map(|r| r.owner.as_str()).collect()
}

/// Lists and resolves roots for one call.
#[derive(Clone)]
pub struct RootResolver {
    host: String,
    timeout: Duration,
    metrics: Option<Arc<ScopeMetrics>>,
}

impl RootResolver {
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            host: if host.is_empty() {
                DEFAULT_HOST.to_string()
            } else {
                host
            },
            timeout: DEFAULT_LIST_TIMEOUT,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<ScopeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn resolve(&self, roots: &[DeclaredRoot]) -> Vec<Root> {
        resolve_roots(roots, &self.host)
    }

    /// Ask the client for its roots, bounded by the timeout and `cancel`.
    ///
    /// Unlike [`Self::resolve_session`], failures are returned so callers that
    /// report on roots can surface them.
    pub async fn list_declared(
        &self,
        session: &dyn RootsSession,
        cancel: &CancellationToken,
    ) -> McpResult<Vec<DeclaredRoot>> {
        if !session.supports_roots() {
            return Err(McpError::RootsUnavailable(
                "client does not support roots".to_string(),
            ));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(McpError::RootsUnavailable("request cancelled".to_string())),
            listed = tokio::time::timeout(self.timeout, session.list_roots()) => match listed {
                Ok(result) => result,
                Err(_) => Err(McpError::RootsUnavailable(format!(
                    "roots/list timed out after {}ms",
                    self.timeout.as_millis()
                ))),
            },
        }
    }

    /// Resolved roots for the session, or an empty list when none are known.
    ///
    /// Never fails: unsupported clients, errors, timeouts, and cancellation
    /// all read as "no roots".
    pub async fn resolve_session(
        &self,
        session: &dyn RootsSession,
        cancel: &CancellationToken,
    ) -> Vec<Root> {
        match self.list_declared(session, cancel).await {
            Ok(declared) => self.resolve(&declared),
            Err(e) => {
                debug!(error = %e, "Roots unavailable, continuing without roots");
                if let Some(metrics) = &self.metrics {
                    metrics.record_roots_unavailable();
                }
                Vec::new()
            }
        }
    }
}

impl Default for RootResolver {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::roots::session::StaticRootsSession;

    struct HangingSession;

    #[async_trait]
    impl RootsSession for HangingSession {
        fn supports_roots(&self) -> bool {
            true
        }

        async fn list_roots(&self) -> McpResult<Vec<DeclaredRoot>> {
            futures::future::pending().await
        }
    }

    struct FailingSession;

    #[async_trait]
    impl RootsSession for FailingSession {
        fn supports_roots(&self) -> bool {
            true
        }

        async fn list_roots(&self) -> McpResult<Vec<DeclaredRoot>> {
            Err(McpError::RootsUnavailable("connection closed".to_string()))
        }
    }

    #[test]
    fn test_resolve_skips_foreign_and_invalid_roots() {
        let declared = vec![
            DeclaredRoot::new("file:///home/me/src/project"),
            DeclaredRoot::new("https://github.com/Octocat/Hello-World").with_name("hello"),
            DeclaredRoot::new(""),
            DeclaredRoot::new("https://gitlab.com/a/b"),
            DeclaredRoot::new("https://github.com/MyOrg"),
        ];

        let roots = resolve_roots(&declared, "github.com");
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].owner, "octocat");
        assert_eq!(roots[0].repo, "hello-world");
        assert_eq!(roots[0].name.as_deref(), Some("hello"));
        assert_eq!(roots[0].uri, "https://github.com/Octocat/Hello-World");
        assert_eq!(roots[1].owner, "myorg");
        assert!(roots[1].is_owner_wide());
    }

    #[test]
    fn test_duplicates_collapse_in_owner_set() {
        let declared = vec![
            DeclaredRoot::new("https://github.com/org/a"),
            DeclaredRoot::new("https://github.com/ORG/a"),
            DeclaredRoot::new("https://github.com/org"),
        ];
        let roots = resolve_roots(&declared, "");
        assert_eq!(roots.len(), 3);
        assert_eq!(distinct_owners(&roots).len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_session() {
        let resolver = RootResolver::new("github.com");
        let session = StaticRootsSession::from_uris(["https://github.com/a/b"]);
        let roots = resolver
            .resolve_session(&session, &CancellationToken::new())
            .await;
        assert_eq!(roots.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_client_fails_fast() {
        let metrics = Arc::new(ScopeMetrics::new());
        let resolver = RootResolver::default().with_metrics(metrics.clone());
        let roots = resolver
            .resolve_session(&StaticRootsSession::unsupported(), &CancellationToken::new())
            .await;
        assert!(roots.is_empty());
        assert_eq!(metrics.snapshot().roots_unavailable, 1);
    }

    #[tokio::test]
    async fn test_listing_error_degrades_to_empty() {
        let resolver = RootResolver::default();
        let roots = resolver
            .resolve_session(&FailingSession, &CancellationToken::new())
            .await;
        assert!(roots.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_timeout_degrades_to_empty() {
        let resolver = RootResolver::default().with_timeout(Duration::from_millis(50));
        let roots = resolver
            .resolve_session(&HangingSession, &CancellationToken::new())
            .await;
        assert!(roots.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_listing_degrades_to_empty() {
        let resolver = RootResolver::default().with_timeout(Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver
            .list_declared(&HangingSession, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::RootsUnavailable(_)));

        let roots = resolver.resolve_session(&HangingSession, &cancel).await;
        assert!(roots.is_empty());
    }
}
