//! Descriptor types held by the inventory.

use std::{borrow::Cow, fmt, sync::Arc};

use rmcp::model::{JsonObject, Prompt, RawResource, Tool};
use serde::{Deserialize, Serialize};

use crate::annotations::ToolAnnotations;

/// Toolset selection keyword meaning "every known toolset".
pub const ALL_TOOLSETS: &str = "all";

/// Toolset selection keyword expanding to toolsets marked default.
pub const DEFAULT_TOOLSETS: &str = "default";

/// Identifier of a toolset (e.g. `issues`, `pull_requests`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolsetId(String);

impl ToolsetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolsetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ToolsetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Static description of a toolset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsetMetadata {
    pub id: ToolsetId,
    #[serde(default)]
    pub description: String,
    /// Enabled when no explicit toolset selection is made.
    #[serde(default)]
    pub default: bool,
    /// Text appended to the server instructions while the toolset is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl ToolsetMetadata {
    pub fn new(id: impl Into<ToolsetId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            default: false,
            instructions: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// A tool as declared in the catalog, plus the metadata used for filtering.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Wire definition. `input_schema` is shared; rewrites replace the `Arc`.
    pub tool: Tool,
    pub toolset: ToolsetId,
    pub annotations: ToolAnnotations,
    /// Token scopes the tool needs. All must be granted.
    pub required_scopes: Vec<String>,
    /// Visible only while this feature flag is on.
    pub feature_flag: Option<String>,
    /// Visible only in insiders mode.
    pub insiders_only: bool,
}

impl ToolDescriptor {
    /// Build a descriptor from a JSON schema object. Non-object schemas become
    /// an empty object schema.
    pub fn new(
        toolset: impl Into<ToolsetId>,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        let schema_map = match input_schema {
            serde_json::Value::Object(m) => m,
            _ => {
                let mut m = serde_json::Map::new();
                m.insert("type".to_string(), serde_json::json!("object"));
                m
            }
        };
        let annotations = ToolAnnotations::default();

        Self {
            tool: Tool {
                name: Cow::Owned(name.into()),
                title: None,
                description: Some(Cow::Owned(description.into())),
                input_schema: Arc::new(schema_map),
                output_schema: None,
                annotations: Some(annotations.to_rmcp()),
                icons: None,
            },
            toolset: toolset.into(),
            annotations,
            required_scopes: Vec::new(),
            feature_flag: None,
            insiders_only: false,
        }
    }

    #[must_use]
    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.tool.annotations = Some(annotations.to_rmcp());
        self.annotations = annotations;
        self
    }

    #[must_use]
    pub fn read_only(self) -> Self {
        let title = self.annotations.title.clone();
        let mut annotations = ToolAnnotations::read_only();
        annotations.title = title;
        self.with_annotations(annotations)
    }

    #[must_use]
    pub fn with_required_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_feature_flag(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = Some(flag.into());
        self
    }

    #[must_use]
    pub fn insiders_only(mut self) -> Self {
        self.insiders_only = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }

    pub fn description(&self) -> &str {
        self.tool.description.as_deref().unwrap_or_default()
    }

    pub fn input_schema(&self) -> &JsonObject {
        &self.tool.input_schema
    }

    pub fn is_read_only(&self) -> bool {
        self.annotations.read_only
    }

    /// Names of the schema's top-level properties.
    pub fn property_names(&self) -> Vec<&str> {
        self.tool
            .input_schema
            .get("properties")
            .and_then(|v| v.as_object())
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Names listed in the schema's `required` array.
    pub fn required_fields(&self) -> Vec<&str> {
        self.tool
            .input_schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// Description text of one schema property.
    pub fn field_description(&self, field: &str) -> Option<&str> {
        self.tool
            .input_schema
            .get("properties")?
            .get(field)?
            .get("description")?
            .as_str()
    }
}

/// A resource (or resource template) in the catalog.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub resource: RawResource,
    pub toolset: ToolsetId,
    pub feature_flag: Option<String>,
    pub insiders_only: bool,
}

impl ResourceDescriptor {
    pub fn new(toolset: impl Into<ToolsetId>, resource: RawResource) -> Self {
        Self {
            resource,
            toolset: toolset.into(),
            feature_flag: None,
            insiders_only: false,
        }
    }

    #[must_use]
    pub fn with_feature_flag(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = Some(flag.into());
        self
    }

    #[must_use]
    pub fn insiders_only(mut self) -> Self {
        self.insiders_only = true;
        self
    }

    pub fn uri(&self) -> &str {
        &self.resource.uri
    }
}

/// A prompt in the catalog.
#[derive(Debug, Clone)]
pub struct PromptDescriptor {
    pub prompt: Prompt,
    pub toolset: ToolsetId,
    pub feature_flag: Option<String>,
    pub insiders_only: bool,
}

impl PromptDescriptor {
    pub fn new(toolset: impl Into<ToolsetId>, prompt: Prompt) -> Self {
        Self {
            prompt,
            toolset: toolset.into(),
            feature_flag: None,
            insiders_only: false,
        }
    }

    #[must_use]
    pub fn with_feature_flag(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = Some(flag.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.prompt.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_tool() -> ToolDescriptor {
        ToolDescriptor::new(
            "issues",
            "list_issues",
            "List issues in a repository",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string", "description": "Repository owner"},
                    "repo": {"type": "string", "description": "Repository name"},
                    "state": {"type": "string"}
                },
                "required": ["owner", "repo"]
            }),
        )
    }

    #[test]
    fn test_descriptor_accessors() {
        let tool = issue_tool().read_only().with_required_scopes(["repo"]);
        assert_eq!(tool.name(), "list_issues");
        assert_eq!(tool.toolset.as_str(), "issues");
        assert!(tool.is_read_only());
        assert_eq!(tool.required_fields(), vec!["owner", "repo"]);
        assert_eq!(tool.field_description("owner"), Some("Repository owner"));
        assert_eq!(tool.field_description("state"), None);
        assert_eq!(tool.property_names().len(), 3);
        assert!(tool.property_names().contains(&"state"));
        assert_eq!(tool.required_scopes, vec!["repo".to_string()]);
        assert_eq!(
            tool.tool.annotations.as_ref().and_then(|a| a.read_only_hint),
            Some(true)
        );
    }

    #[test]
    fn test_non_object_schema_becomes_empty_object() {
        let tool = ToolDescriptor::new("x", "t", "d", serde_json::Value::Null);
        assert_eq!(
            tool.input_schema().get("type"),
            Some(&serde_json::json!("object"))
        );
        assert!(tool.required_fields().is_empty());
    }

    #[test]
    fn test_toolset_metadata_yaml() {
        let meta: ToolsetMetadata = serde_yaml::from_str(
            "id: repos\ndescription: Repository tools\ndefault: true\n",
        )
        .unwrap();
        assert_eq!(meta.id, ToolsetId::from("repos"));
        assert!(meta.default);
        assert!(meta.instructions.is_none());
    }
}
