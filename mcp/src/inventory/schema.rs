//! Input-schema rewrites applied when roots can supply owner/repo.

use std::sync::Arc;

use serde_json::Value;

use super::types::ToolDescriptor;

/// Appended to the `owner`/`repo` descriptions of rewritten tools.
pub const ROOTS_OPTIONAL_NOTE: &str = " (optional when roots are configured)";

const ROOT_FIELDS: [&str; 2] = ["owner", "repo"];

/// Copy of `descriptor` with `owner`/`repo` dropped from `required` and a note
/// added to their descriptions.
///
/// Tools that require neither field come back unchanged. The original schema
/// is never modified; the copy gets its own `Arc`.
pub fn make_owner_repo_optional(descriptor: &ToolDescriptor) -> ToolDescriptor {
    let required = descriptor.required_fields();
    if !ROOT_FIELDS.iter().any(|f| required.contains(f)) {
        return descriptor.clone();
    }

    let mut schema = (*descriptor.tool.input_schema).clone();

    if let Some(Value::Array(required)) = schema.get_mut("required") {
        required.retain(|v| !v.as_str().is_some_and(|name| ROOT_FIELDS.contains(&name)));
    }

    if let Some(Value::Object(properties)) = schema.get_mut("properties") {
        for field in ROOT_FIELDS {
            if let Some(Value::Object(prop)) = properties.get_mut(field) {
                let description = prop
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let annotated = format!("{description}{ROOTS_OPTIONAL_NOTE}");
                prop.insert(
                    "description".to_string(),
                    Value::String(annotated.trim_start().to_string()),
                );
            }
        }
    }

    let mut rewritten = descriptor.clone();
    rewritten.tool.input_schema = Arc::new(schema);
    rewritten
}

/// Apply [`make_owner_repo_optional`] to every descriptor.
pub fn make_all_owner_repo_optional(descriptors: &[ToolDescriptor]) -> Vec<ToolDescriptor> {
    descriptors.iter().map(make_owner_repo_optional).collect()
}
