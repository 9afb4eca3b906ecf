//! `list_roots`: shows the client's roots and how they parse.

use async_trait::async_trait;
use rmcp::model::JsonObject;
use serde::Serialize;
use serde_json::json;

use super::{error_result, json_result, text_result};
use crate::{
    annotations::ToolAnnotations,
    core::handler::{ToolContext, ToolHandler},
    inventory::{ToolDescriptor, ToolsetMetadata},
    middleware::CallOutcome,
    roots::{parse_root_uri, RootResolver},
};

pub const LIST_ROOTS: &str = "list_roots";
pub const CONTEXT_TOOLSET: &str = "context";

pub fn context_toolset() -> ToolsetMetadata {
    ToolsetMetadata::new(
        CONTEXT_TOOLSET,
        "Tools that describe the current user and the session context",
    )
    .with_default(true)
}

pub fn list_roots_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        CONTEXT_TOOLSET,
        LIST_ROOTS,
        "List the MCP roots configured by the client. Shows the root URIs and any parsed \
         owner/repo information. Use this to understand which repositories are in scope.",
        json!({"type": "object", "properties": {}}),
    )
    .with_annotations(ToolAnnotations::read_only().with_title("List configured roots"))
    .insiders_only()
}

#[derive(Debug, Serialize)]
struct RootInfo {
    uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<String>,
}

pub struct ListRootsTool {
    resolver: RootResolver,
}

impl ListRootsTool {
    pub fn new(resolver: RootResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ToolHandler for ListRootsTool {
    async fn call(&self, ctx: ToolContext, _arguments: JsonObject) -> CallOutcome {
        let Some(session) = &ctx.session else {
            return error_result("no session available");
        };

        let declared = match self
            .resolver
            .list_declared(session.as_ref(), &ctx.cancel)
            .await
        {
            Ok(declared) => declared,
            Err(e) => return error_result(format!("failed to list roots: {e}")),
        };
        if declared.is_empty() {
            return text_result("No roots configured");
        }

        let infos: Vec<RootInfo> = declared
            .into_iter()
            .map(|root| {
                let parsed = parse_root_uri(&root.uri, self.resolver.host()).ok();
                let (owner, repo) = match parsed {
                    Some((owner, repo)) => (Some(owner), (!repo.is_empty()).then_some(repo)),
                    None => (None, None),
                };
                RootInfo {
                    uri: root.uri,
                    name: root.name.filter(|n| !n.is_empty()),
                    owner,
                    repo,
                }
            })
            .collect();

        json_result(&infos)
    }
}
