//! Error types for inventory building, root parsing, and configuration.
//!
//! Access denials are not errors here: the enforcement middleware returns them
//! as ordinary tool results so the calling model can correct its arguments.

use thiserror::Error;

pub type McpResult<T> = Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Duplicate tool name in inventory: '{0}'")]
    DuplicateTool(String),

    #[error("Duplicate resource in inventory: '{0}'")]
    DuplicateResource(String),

    #[error("Duplicate prompt in inventory: '{0}'")]
    DuplicatePrompt(String),

    #[error("Alias '{alias}' collides with an existing tool name")]
    AliasCollision { alias: String },

    #[error("Unknown toolset: {0}")]
    UnknownToolset(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("No handler registered for tool: {0}")]
    HandlerMissing(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Roots unavailable: {0}")]
    RootsUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    RootParse(#[from] RootParseError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<McpError> for rmcp::ErrorData {
    fn from(err: McpError) -> Self {
        match err {
            McpError::ToolNotFound(_) | McpError::InvalidArguments(_) => {
                rmcp::ErrorData::invalid_params(err.to_string(), None)
            }
            other => rmcp::ErrorData::internal_error(other.to_string(), None),
        }
    }
}

/// Reasons a root URI is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RootParseError {
    #[error("empty root URI")]
    Empty,

    #[error("invalid URI {uri:?}: {reason}")]
    Invalid { uri: String, reason: String },

    #[error("unsupported URI scheme {scheme:?} in {uri:?} (expected https, http, or git)")]
    UnsupportedScheme { uri: String, scheme: String },

    #[error("URI host {host:?} does not match expected host {expected:?}")]
    HostMismatch { host: String, expected: String },

    #[error("URI {0:?} has no path (expected /owner[/repo])")]
    EmptyPath(String),

    #[error("URI {0:?} has an empty repository name")]
    EmptyRepo(String),
}
