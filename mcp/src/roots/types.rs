//! Root types shared by the parser, resolver, and middlewares.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host assumed when no expected host is configured.
pub const DEFAULT_HOST: &str = "github.com";

/// A root exactly as the client declared it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeclaredRoot {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DeclaredRoot {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<rmcp::model::Root> for DeclaredRoot {
    fn from(root: rmcp::model::Root) -> Self {
        Self {
            uri: root.uri,
            name: root.name,
        }
    }
}

/// A declared root that parsed as an owner or owner/repo location.
///
/// `owner` and `repo` are always lowercase. An empty `repo` marks an
/// owner-wide root that admits every repository of that owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Root {
    pub owner: String,
    pub repo: String,
    pub uri: String,
    pub name: Option<String>,
}

impl Root {
    pub fn is_owner_wide(&self) -> bool {
        self.repo.is_empty()
    }

    pub fn matches_owner(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repo.is_empty() {
            write!(f, "{}/*", self.owner)
        } else {
            write!(f, "{}/{}", self.owner, self.repo)
        }
    }
}
