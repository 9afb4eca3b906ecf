//! Gateway configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty file is a valid
//! configuration (default toolsets, no roots scoping).

use std::{collections::BTreeMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    annotations::ToolAnnotations,
    error::{McpError, McpResult},
    inventory::{
        feature_checker_from_list, InventoryBuilder, ToolDescriptor, ToolsetMetadata,
        ALL_TOOLSETS, DEFAULT_TOOLSETS,
    },
    roots::{RootResolver, DEFAULT_HOST},
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Host that root URIs must point at.
    #[serde(default = "default_host")]
    pub host: String,

    /// Toolset selection. Absent means the default toolsets; an empty list
    /// means none.
    #[serde(default)]
    pub toolsets: Option<Vec<String>>,

    /// Tools enabled in addition to the selected toolsets.
    #[serde(default)]
    pub tools: Vec<String>,

    /// Tools that are never exposed.
    #[serde(default)]
    pub exclude_tools: Vec<String>,

    #[serde(default)]
    pub read_only: bool,

    /// Enabled feature flags.
    #[serde(default)]
    pub features: Vec<String>,

    /// Expose toolset enable/disable meta-tools.
    #[serde(default)]
    pub dynamic_toolsets: bool,

    #[serde(default)]
    pub insiders: bool,

    /// Infer and enforce owner/repo from client roots.
    #[serde(default)]
    pub roots_mode: bool,

    /// Scopes of the token in use. Absent means unknown (no filtering).
    #[serde(default)]
    pub token_scopes: Option<Vec<String>>,

    /// Upper bound on one roots/list round trip.
    #[serde(default = "default_roots_timeout_ms")]
    pub roots_timeout_ms: u64,

    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,

    /// Advertise toolset instructions to clients.
    #[serde(default = "default_true")]
    pub instructions: bool,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Declarative tool catalog.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub toolsets: Vec<ToolsetMetadata>,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    /// Deprecated tool name -> current name.
    #[serde(default)]
    pub deprecated_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    pub name: String,
    pub toolset: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
    /// Shorthand for `annotations.read_only`.
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_flag: Option<String>,
    #[serde(default)]
    pub insiders_only: bool,
}

impl ToolConfig {
    pub fn to_descriptor(&self) -> ToolDescriptor {
        let mut annotations = self.annotations.clone().unwrap_or_default();
        if self.read_only {
            annotations = annotations.with_read_only(true).with_destructive(false);
        }
        let mut descriptor = ToolDescriptor::new(
            self.toolset.as_str(),
            self.name.as_str(),
            self.description.as_str(),
            self.input_schema.clone(),
        )
        .with_annotations(annotations)
        .with_required_scopes(self.required_scopes.iter().cloned());
        if let Some(flag) = &self.feature_flag {
            descriptor = descriptor.with_feature_flag(flag.as_str());
        }
        if self.insiders_only {
            descriptor = descriptor.insiders_only();
        }
        descriptor
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_roots_timeout_ms() -> u64 {
    5000
}

fn default_audit_capacity() -> usize {
    10000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            toolsets: None,
            tools: Vec::new(),
            exclude_tools: Vec::new(),
            read_only: false,
            features: Vec::new(),
            dynamic_toolsets: false,
            insiders: false,
            roots_mode: false,
            token_scopes: None,
            roots_timeout_ms: default_roots_timeout_ms(),
            audit_capacity: default_audit_capacity(),
            instructions: true,
            log: LogConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Trim names, drop empty ones, and drop repeats (first occurrence wins).
pub fn clean_tools(tools: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tools.len());
    for tool in tools {
        let tool = tool.trim();
        if !tool.is_empty() && !cleaned.iter().any(|t| t == tool) {
            cleaned.push(tool.to_string());
        }
    }
    cleaned
}

/// Toolset selection to hand to the inventory builder.
///
/// Dynamic mode drops `all`/`default` and starts empty when nothing is
/// selected. Explicit tools without toolsets also start empty, so only those
/// tools are registered. Otherwise `None` (defaults).
pub fn resolve_enabled_toolsets(
    dynamic: bool,
    toolsets: Option<&[String]>,
    tools: &[String],
) -> Option<Vec<String>> {
    if let Some(toolsets) = toolsets {
        let selected = toolsets
            .iter()
            .filter(|t| !(dynamic && (t.as_str() == ALL_TOOLSETS || t.as_str() == DEFAULT_TOOLSETS)))
            .cloned()
            .collect();
        return Some(selected);
    }
    if dynamic || !clean_tools(tools).is_empty() {
        return Some(Vec::new());
    }
    None
}

impl GatewayConfig {
    /// Load and validate a YAML file.
    pub async fn from_file(path: impl AsRef<Path>) -> McpResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> McpResult<Self> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> McpResult<()> {
        if self.host.trim().is_empty() {
            return Err(McpError::Config("host must not be empty".to_string()));
        }
        if self.host.contains("://") || self.host.contains('/') {
            return Err(McpError::Config(format!(
                "host must be a bare host name, got {:?}",
                self.host
            )));
        }
        if self.roots_timeout_ms == 0 {
            return Err(McpError::Config(
                "roots_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.audit_capacity == 0 {
            return Err(McpError::Config(
                "audit_capacity must be greater than zero".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for tool in &self.catalog.tools {
            if tool.name.trim().is_empty() {
                return Err(McpError::Config("catalog tool with empty name".to_string()));
            }
            if tool.toolset.trim().is_empty() {
                return Err(McpError::Config(format!(
                    "catalog tool {:?} has no toolset",
                    tool.name
                )));
            }
            if !tool.input_schema.is_object() {
                return Err(McpError::Config(format!(
                    "catalog tool {:?}: input_schema must be an object",
                    tool.name
                )));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(McpError::DuplicateTool(tool.name.clone()));
            }
        }
        for toolset in &self.catalog.toolsets {
            let id = toolset.id.as_str();
            if id == ALL_TOOLSETS || id == DEFAULT_TOOLSETS {
                return Err(McpError::Config(format!(
                    "toolset id {id:?} is reserved"
                )));
            }
        }
        Ok(())
    }

    pub fn roots_timeout(&self) -> Duration {
        Duration::from_millis(self.roots_timeout_ms)
    }

    pub fn resolver(&self) -> RootResolver {
        RootResolver::new(self.host.clone()).with_timeout(self.roots_timeout())
    }

    pub fn enabled_toolsets(&self) -> Option<Vec<String>> {
        resolve_enabled_toolsets(self.dynamic_toolsets, self.toolsets.as_deref(), &self.tools)
    }

    /// Inventory builder with the catalog loaded and every axis applied.
    pub fn inventory_builder(&self) -> InventoryBuilder {
        InventoryBuilder::new()
            .set_toolsets(self.catalog.toolsets.clone())
            .set_tools(
                self.catalog
                    .tools
                    .iter()
                    .map(ToolConfig::to_descriptor)
                    .collect(),
            )
            .with_deprecated_aliases(self.catalog.deprecated_aliases.clone())
            .with_toolsets(self.enabled_toolsets())
            .with_tools(clean_tools(&self.tools))
            .with_exclude_tools(clean_tools(&self.exclude_tools))
            .with_read_only(self.read_only)
            .with_insiders_mode(self.insiders)
            .with_feature_checker(feature_checker_from_list(self.features.clone()))
            .with_token_scopes(self.token_scopes.clone())
            .with_owner_repo_optional(self.roots_mode)
            .with_server_instructions(self.instructions)
    }
}
