//! Session capability for listing client-declared roots.

use async_trait::async_trait;
use rmcp::{service::Peer, RoleServer};

use super::types::DeclaredRoot;
use crate::error::{McpError, McpResult};

/// The part of a client session the scoping layer needs.
///
/// `list_roots` is a round trip to the client; callers bound it with a
/// timeout and the call's cancellation token.
#[async_trait]
pub trait RootsSession: Send + Sync {
    /// Whether the client advertised the roots capability.
    fn supports_roots(&self) -> bool;

    async fn list_roots(&self) -> McpResult<Vec<DeclaredRoot>>;
}

/// [`RootsSession`] backed by a live rmcp server peer.
#[derive(Clone)]
pub struct PeerRootsSession {
    peer: Peer<RoleServer>,
}

impl PeerRootsSession {
    pub fn new(peer: Peer<RoleServer>) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl RootsSession for PeerRootsSession {
    fn supports_roots(&self) -> bool {
        self.peer
            .peer_info()
            .map(|info| info.capabilities.roots.is_some())
            .unwrap_or(false)
    }

    async fn list_roots(&self) -> McpResult<Vec<DeclaredRoot>> {
        let result = self
            .peer
            .list_roots()
            .await
            .map_err(|e| McpError::RootsUnavailable(e.to_string()))?;
        Ok(result.roots.into_iter().map(DeclaredRoot::from).collect())
    }
}

/// Fixed root list, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRootsSession {
    roots: Vec<DeclaredRoot>,
    supported: bool,
}

impl StaticRootsSession {
    pub fn new(roots: Vec<DeclaredRoot>) -> Self {
        Self {
            roots,
            supported: true,
        }
    }

    pub fn from_uris<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(uris.into_iter().map(DeclaredRoot::new).collect())
    }

    /// A session whose client never advertised roots.
    pub fn unsupported() -> Self {
        Self {
            roots: Vec::new(),
            supported: false,
        }
    }
}

#[async_trait]
impl RootsSession for StaticRootsSession {
    fn supports_roots(&self) -> bool {
        self.supported
    }

    async fn list_roots(&self) -> McpResult<Vec<DeclaredRoot>> {
        if !self.supported {
            return Err(McpError::RootsUnavailable(
                "client does not support roots".to_string(),
            ));
        }
        Ok(self.roots.clone())
    }
}
