//! Meta-tools that drive [`DynamicToolsets`].

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::JsonObject;
use serde_json::json;

use super::DynamicToolsets;
use crate::{
    annotations::ToolAnnotations,
    core::handler::{ToolContext, ToolHandler},
    error::McpError,
    inventory::ToolDescriptor,
    middleware::CallOutcome,
    tools::{error_result, json_result, required_str, text_result},
};

pub const DYNAMIC_TOOLSET: &str = "dynamic";
pub const LIST_AVAILABLE_TOOLSETS: &str = "list_available_toolsets";
pub const GET_TOOLSET_TOOLS: &str = "get_toolset_tools";
pub const ENABLE_TOOLSET: &str = "enable_toolset";
pub const DISABLE_TOOLSET: &str = "disable_toolset";

fn toolset_param_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "toolset": {"type": "string", "description": description}
        },
        "required": ["toolset"]
    })
}

/// Descriptors of the four meta-tools. None of them touch remote state.
pub fn dynamic_tool_descriptors() -> Vec<ToolDescriptor> {
    let annotations = |title: &str| ToolAnnotations::read_only().with_title(title);
    vec![
        ToolDescriptor::new(
            DYNAMIC_TOOLSET,
            LIST_AVAILABLE_TOOLSETS,
            "List available toolsets this server can offer, providing the enabled status of each. \
             Use this when a task could be achieved with a tool and the currently available tools \
             aren't enough. Call get_toolset_tools with these toolset names to discover specific tools.",
            json!({"type": "object", "properties": {}}),
        )
        .with_annotations(annotations("List available toolsets")),
        ToolDescriptor::new(
            DYNAMIC_TOOLSET,
            GET_TOOLSET_TOOLS,
            "Lists all the capabilities that are enabled with the specified toolset. \
             Use this to get clarity on whether enabling a toolset would help you complete a task.",
            toolset_param_schema("The name of the toolset you want to get the tools for"),
        )
        .with_annotations(annotations("List all tools in a toolset")),
        ToolDescriptor::new(
            DYNAMIC_TOOLSET,
            ENABLE_TOOLSET,
            "Enable one of the sets of tools the server provides. \
             Use get_toolset_tools and list_available_toolsets first to see what this will enable.",
            toolset_param_schema("The name of the toolset to enable"),
        )
        .with_annotations(annotations("Enable a toolset")),
        ToolDescriptor::new(
            DYNAMIC_TOOLSET,
            DISABLE_TOOLSET,
            "Disable one of the enabled toolsets. Its tools are removed from the tool list.",
            toolset_param_schema("The name of the toolset to disable"),
        )
        .with_annotations(annotations("Disable a toolset")),
    ]
}

/// Turn controller errors into results the model can read.
fn recoverable(err: McpError) -> CallOutcome {
    match err {
        McpError::UnknownToolset(name) => error_result(format!("Toolset {name} not found")),
        other => error_result(other.to_string()),
    }
}

pub struct ListAvailableToolsetsTool(pub Arc<DynamicToolsets>);

#[async_trait]
impl ToolHandler for ListAvailableToolsetsTool {
    async fn call(&self, _ctx: ToolContext, _arguments: JsonObject) -> CallOutcome {
        json_result(&self.0.available())
    }
}

pub struct GetToolsetToolsTool(pub Arc<DynamicToolsets>);

#[async_trait]
impl ToolHandler for GetToolsetToolsTool {
    async fn call(&self, _ctx: ToolContext, arguments: JsonObject) -> CallOutcome {
        let toolset = match required_str(&arguments, "toolset") {
            Ok(toolset) => toolset,
            Err(e) => return recoverable(e),
        };
        match self.0.toolset_tools(toolset) {
            Ok(tools) => json_result(&tools),
            Err(e) => recoverable(e),
        }
    }
}

pub struct EnableToolsetTool(pub Arc<DynamicToolsets>);

#[async_trait]
impl ToolHandler for EnableToolsetTool {
    async fn call(&self, _ctx: ToolContext, arguments: JsonObject) -> CallOutcome {
        let toolset = match required_str(&arguments, "toolset") {
            Ok(toolset) => toolset,
            Err(e) => return recoverable(e),
        };
        match self.0.enable(toolset) {
            Ok(true) => text_result(format!("Toolset {toolset} enabled")),
            Ok(false) => text_result(format!("Toolset {toolset} is already enabled")),
            Err(e) => recoverable(e),
        }
    }
}

pub struct DisableToolsetTool(pub Arc<DynamicToolsets>);

#[async_trait]
impl ToolHandler for DisableToolsetTool {
    async fn call(&self, _ctx: ToolContext, arguments: JsonObject) -> CallOutcome {
        let toolset = match required_str(&arguments, "toolset") {
            Ok(toolset) => toolset,
            Err(e) => return recoverable(e),
        };
        match self.0.disable(toolset) {
            Ok(true) => text_result(format!("Toolset {toolset} disabled")),
            Ok(false) => text_result(format!("Toolset {toolset} is already disabled")),
            Err(e) => recoverable(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        core::handler::AllowAllRepos,
        inventory::{InventoryBuilder, LiveInventory, ToolsetMetadata},
    };

    fn dynamic() -> Arc<DynamicToolsets> {
        let template = InventoryBuilder::new()
            .set_toolsets(vec![ToolsetMetadata::new("issues", "Issue tools")])
            .set_tools(vec![ToolDescriptor::new(
                "issues",
                "list_issues",
                "List issues",
                json!({"type": "object"}),
            )])
            .with_toolsets(Some(vec![]));
        let live = LiveInventory::new(template.build().unwrap());
        Arc::new(DynamicToolsets::new(template, live))
    }

    fn ctx(dynamic: &DynamicToolsets) -> ToolContext {
        ToolContext {
            tool_name: String::new(),
            session: None,
            cancel: CancellationToken::new(),
            repo_access: Arc::new(AllowAllRepos),
            inventory: dynamic.snapshot(),
        }
    }

    fn args(toolset: &str) -> JsonObject {
        serde_json::from_value(json!({ "toolset": toolset })).unwrap()
    }

    fn text(outcome: CallOutcome) -> (bool, String) {
        let result = outcome.unwrap();
        (
            result.is_error == Some(true),
            result.content[0].as_text().unwrap().text.clone(),
        )
    }

    #[test]
    fn test_descriptors() {
        let descriptors = dynamic_tool_descriptors();
        assert_eq!(descriptors.len(), 4);
        assert!(descriptors.iter().all(|d| d.is_read_only()));
        let enable = descriptors.iter().find(|d| d.name() == ENABLE_TOOLSET).unwrap();
        assert_eq!(enable.required_fields(), vec!["toolset"]);
    }

    #[tokio::test]
    async fn test_enable_then_disable() {
        let dynamic = dynamic();
        let enable = EnableToolsetTool(dynamic.clone());
        let disable = DisableToolsetTool(dynamic.clone());

        let (is_error, body) = text(enable.call(ctx(&dynamic), args("issues")).await);
        assert!(!is_error);
        assert_eq!(body, "Toolset issues enabled");
        assert!(dynamic.snapshot().has_tool("list_issues"));

        let (_, body) = text(enable.call(ctx(&dynamic), args("issues")).await);
        assert_eq!(body, "Toolset issues is already enabled");

        let (_, body) = text(disable.call(ctx(&dynamic), args("issues")).await);
        assert_eq!(body, "Toolset issues disabled");
        assert!(dynamic.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_missing_params_are_recoverable() {
        let dynamic = dynamic();
        let enable = EnableToolsetTool(dynamic.clone());

        let (is_error, body) = text(enable.call(ctx(&dynamic), args("nope")).await);
        assert!(is_error);
        assert_eq!(body, "Toolset nope not found");

        let (is_error, _) = text(enable.call(ctx(&dynamic), JsonObject::new()).await);
        assert!(is_error);
    }

    #[tokio::test]
    async fn test_listing_tools() {
        let dynamic = dynamic();
        let (_, body) = text(
            ListAvailableToolsetsTool(dynamic.clone())
                .call(ctx(&dynamic), JsonObject::new())
                .await,
        );
        let listed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            listed,
            json!([{"name": "issues", "description": "Issue tools",
                    "can_enable": true, "currently_enabled": false}])
        );

        let (_, body) = text(
            GetToolsetToolsTool(dynamic.clone())
                .call(ctx(&dynamic), args("issues"))
                .await,
        );
        let tools: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(tools[0]["name"], "list_issues");
        assert_eq!(tools[0]["toolset"], "issues");
    }
}
