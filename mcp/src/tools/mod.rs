//! Built-in tools and result helpers shared by handlers.

pub mod list_roots;

use rmcp::model::{CallToolResult, Content, JsonObject};
use serde::Serialize;

pub use list_roots::{
    context_toolset, list_roots_descriptor, ListRootsTool, CONTEXT_TOOLSET, LIST_ROOTS,
};

use crate::{
    error::{McpError, McpResult},
    middleware::CallOutcome,
};

pub fn text_result(text: impl Into<String>) -> CallOutcome {
    Ok(CallToolResult::success(vec![Content::text(text.into())]))
}

/// A recoverable error the calling model can read and act on.
pub fn error_result(message: impl Into<String>) -> CallOutcome {
    Ok(CallToolResult::error(vec![Content::text(message.into())]))
}

/// `value` as pretty-printed JSON text.
pub fn json_result<T: Serialize>(value: &T) -> CallOutcome {
    match serde_json::to_string_pretty(value) {
        Ok(text) => text_result(text),
        Err(e) => error_result(format!("failed to marshal result: {e}")),
    }
}

/// Required non-empty string argument.
pub fn required_str<'a>(arguments: &'a JsonObject, key: &str) -> McpResult<&'a str> {
    match arguments.get(key) {
        None => Err(McpError::InvalidArguments(format!(
            "missing required parameter: {key}"
        ))),
        Some(value) => value
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                McpError::InvalidArguments(format!("parameter {key} must be a non-empty string"))
            }),
    }
}
