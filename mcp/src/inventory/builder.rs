//! Inventory construction from independent configuration axes.
//!
//! Resolution order:
//! 1. tools in the resolved toolsets, plus explicitly named tools
//! 2. minus excluded names (final; nothing re-adds them)
//! 3. minus non-read-only tools in read-only mode
//! 4. minus insiders-only tools outside insiders mode
//! 5. minus tools whose feature flag is off
//! 6. minus tools needing token scopes the token lacks
//! 7. plus deprecated aliases for surviving tools
//! 8. with owner/repo made optional when roots mode is on

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, warn};

use super::{
    filters::{FeatureChecker, FeatureGate, ScopeFilter},
    schema::make_all_owner_repo_optional,
    snapshot::Inventory,
    types::{
        PromptDescriptor, ResourceDescriptor, ToolDescriptor, ToolsetMetadata, ALL_TOOLSETS,
        DEFAULT_TOOLSETS,
    },
};
use crate::error::{McpError, McpResult};

#[derive(Clone, Default)]
pub struct InventoryBuilder {
    toolsets: Arc<Vec<ToolsetMetadata>>,
    tools: Arc<Vec<ToolDescriptor>>,
    resources: Arc<Vec<ResourceDescriptor>>,
    prompts: Arc<Vec<PromptDescriptor>>,

    enabled_toolsets: Option<Vec<String>>,
    additional_tools: Vec<String>,
    exclude_tools: Vec<String>,
    read_only: bool,
    insiders_mode: bool,
    feature_gate: FeatureGate,
    scope_filter: Option<ScopeFilter>,
    deprecated_aliases: BTreeMap<String, String>,
    owner_repo_optional: bool,
    server_instructions: bool,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Catalog ---

    #[must_use]
    pub fn set_toolsets(mut self, toolsets: Vec<ToolsetMetadata>) -> Self {
        self.toolsets = Arc::new(toolsets);
        self
    }

    #[must_use]
    pub fn set_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    #[must_use]
    pub fn set_resources(mut self, resources: Vec<ResourceDescriptor>) -> Self {
        self.resources = Arc::new(resources);
        self
    }

    #[must_use]
    pub fn set_prompts(mut self, prompts: Vec<PromptDescriptor>) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    /// Append toolsets, skipping ids that are already declared.
    #[must_use]
    pub fn add_toolsets(mut self, toolsets: impl IntoIterator<Item = ToolsetMetadata>) -> Self {
        let declared = Arc::make_mut(&mut self.toolsets);
        for toolset in toolsets {
            if !declared.iter().any(|t| t.id == toolset.id) {
                declared.push(toolset);
            }
        }
        self
    }

    #[must_use]
    pub fn add_tools(mut self, tools: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        Arc::make_mut(&mut self.tools).extend(tools);
        self
    }

    // --- Axes ---

    /// `None` uses the default toolsets, `Some(vec![])` enables none, and an
    /// explicit list enables exactly those (`"all"` and `"default"` expand).
    #[must_use]
    pub fn with_toolsets(mut self, toolsets: Option<Vec<String>>) -> Self {
        self.enabled_toolsets = toolsets;
        self
    }

    /// Tools enabled in addition to those from toolsets.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.additional_tools = tools;
        self
    }

    /// Tools removed regardless of any other axis.
    #[must_use]
    pub fn with_exclude_tools(mut self, tools: Vec<String>) -> Self {
        self.exclude_tools = tools;
        self
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_insiders_mode(mut self, insiders: bool) -> Self {
        self.insiders_mode = insiders;
        self
    }

    #[must_use]
    pub fn with_feature_checker(mut self, checker: FeatureChecker) -> Self {
        self.feature_gate = FeatureGate::new(checker);
        self
    }

    /// Filter by token scopes. `None` means the scopes are unknown and
    /// nothing is filtered.
    #[must_use]
    pub fn with_token_scopes(mut self, scopes: Option<Vec<String>>) -> Self {
        self.scope_filter = scopes.map(ScopeFilter::new);
        self
    }

    #[must_use]
    pub fn with_scope_filter(mut self, filter: ScopeFilter) -> Self {
        self.scope_filter = Some(filter);
        self
    }

    /// Deprecated name -> replacement name.
    #[must_use]
    pub fn with_deprecated_aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.deprecated_aliases = aliases
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Make `owner`/`repo` optional in tool schemas (roots can fill them).
    #[must_use]
    pub fn with_owner_repo_optional(mut self, enabled: bool) -> Self {
        self.owner_repo_optional = enabled;
        self
    }

    #[must_use]
    pub fn with_server_instructions(mut self, enabled: bool) -> Self {
        self.server_instructions = enabled;
        self
    }

    // --- Catalog queries (independent of the axes) ---

    /// Every toolset: declared ones first, then ones only referenced by tools.
    pub fn known_toolsets(&self) -> Vec<ToolsetMetadata> {
        let mut known: Vec<ToolsetMetadata> = Vec::with_capacity(self.toolsets.len());
        let mut seen: HashSet<&str> = HashSet::new();
        for meta in self.toolsets.iter() {
            if seen.insert(meta.id.as_str()) {
                known.push(meta.clone());
            }
        }
        let referenced = self
            .tools
            .iter()
            .map(|t| &t.toolset)
            .chain(self.resources.iter().map(|r| &r.toolset))
            .chain(self.prompts.iter().map(|p| &p.toolset));
        for id in referenced {
            if seen.insert(id.as_str()) {
                known.push(ToolsetMetadata::new(id.clone(), String::new()));
            }
        }
        known
    }

    pub fn is_known_toolset(&self, id: &str) -> bool {
        self.known_toolsets().iter().any(|t| t.id.as_str() == id)
    }

    /// Catalog tools tagged with `toolset`, before any filtering.
    pub fn catalog_tools(&self, toolset: &str) -> Vec<&ToolDescriptor> {
        self.tools
            .iter()
            .filter(|t| t.toolset.as_str() == toolset)
            .collect()
    }

    /// The current toolset selection (see [`Self::with_toolsets`]).
    pub fn toolset_selection(&self) -> Option<&[String]> {
        self.enabled_toolsets.as_deref()
    }

    /// Canonical name for a possibly deprecated tool name.
    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.deprecated_aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Expand the selection into concrete toolset ids plus the names that
    /// matched nothing.
    fn resolve_toolsets(&self, known: &[ToolsetMetadata]) -> (BTreeSet<String>, Vec<String>) {
        let defaults = || {
            known
                .iter()
                .filter(|t| t.default)
                .map(|t| t.id.to_string())
                .collect::<Vec<_>>()
        };

        let Some(selection) = &self.enabled_toolsets else {
            return (defaults().into_iter().collect(), Vec::new());
        };

        let mut enabled = BTreeSet::new();
        let mut unrecognized = Vec::new();
        for raw in selection {
            let name = raw.trim();
            match name {
                "" => {}
                ALL_TOOLSETS => enabled.extend(known.iter().map(|t| t.id.to_string())),
                DEFAULT_TOOLSETS => enabled.extend(defaults()),
                id if known.iter().any(|t| t.id.as_str() == id) => {
                    enabled.insert(id.to_string());
                }
                other => {
                    if !unrecognized.iter().any(|u| u == other) {
                        unrecognized.push(other.to_string());
                    }
                }
            }
        }
        (enabled, unrecognized)
    }

    /// Visibility checks shared by tools, resources, and prompts.
    fn passes_gates(&self, feature_flag: Option<&str>, insiders_only: bool) -> bool {
        if insiders_only && !self.insiders_mode {
            return false;
        }
        self.feature_gate.allows(feature_flag)
    }

    pub fn build(&self) -> McpResult<Inventory> {
        let known = self.known_toolsets();
        let (enabled_toolsets, unrecognized_toolsets) = self.resolve_toolsets(&known);
        if !unrecognized_toolsets.is_empty() {
            warn!(
                toolsets = %unrecognized_toolsets.join(", "),
                "Unrecognized toolsets ignored"
            );
        }

        let explicit: HashSet<&str> = self
            .additional_tools
            .iter()
            .map(|n| self.canonical(n.trim()))
            .filter(|n| !n.is_empty())
            .collect();
        let unrecognized_tools: Vec<String> = {
            let mut missing: Vec<String> = explicit
                .iter()
                .filter(|n| !self.tools.iter().any(|t| t.name() == **n))
                .map(|n| n.to_string())
                .collect();
            missing.sort();
            missing
        };
        if !unrecognized_tools.is_empty() {
            warn!(tools = %unrecognized_tools.join(", "), "Unrecognized tools ignored");
        }

        let excluded: HashSet<&str> = self
            .exclude_tools
            .iter()
            .flat_map(|n| {
                let n = n.trim();
                [n, self.canonical(n)]
            })
            .filter(|n| !n.is_empty())
            .collect();

        let mut tools: Vec<ToolDescriptor> = Vec::new();
        let mut tool_index: HashMap<String, usize> = HashMap::new();
        for descriptor in self.tools.iter() {
            let name = descriptor.name();
            let selected = enabled_toolsets.contains(descriptor.toolset.as_str())
                || explicit.contains(name);
            if !selected {
                continue;
            }
            if excluded.contains(name) {
                debug!(tool = %name, "Tool excluded by configuration");
                continue;
            }
            if self.read_only && !descriptor.is_read_only() {
                continue;
            }
            if !self.passes_gates(descriptor.feature_flag.as_deref(), descriptor.insiders_only) {
                continue;
            }
            if let Some(filter) = &self.scope_filter {
                if !filter.allows(&descriptor.required_scopes) {
                    debug!(
                        tool = %name,
                        required = ?descriptor.required_scopes,
                        "Tool hidden: token lacks required scopes"
                    );
                    continue;
                }
            }

            if tool_index.contains_key(name) {
                return Err(McpError::DuplicateTool(name.to_string()));
            }
            tool_index.insert(name.to_string(), tools.len());
            tools.push(descriptor.clone());
        }

        let mut aliases = BTreeMap::new();
        for (alias, target) in &self.deprecated_aliases {
            if !tool_index.contains_key(target.as_str()) {
                continue;
            }
            if tool_index.contains_key(alias.as_str()) {
                return Err(McpError::AliasCollision {
                    alias: alias.clone(),
                });
            }
            aliases.insert(alias.clone(), target.clone());
        }

        if self.owner_repo_optional {
            tools = make_all_owner_repo_optional(&tools);
        }

        let mut resources: Vec<ResourceDescriptor> = Vec::new();
        for resource in self.resources.iter() {
            if !enabled_toolsets.contains(resource.toolset.as_str())
                || excluded.contains(resource.resource.name.as_str())
                || !self.passes_gates(resource.feature_flag.as_deref(), resource.insiders_only)
            {
                continue;
            }
            if resources.iter().any(|r| r.uri() == resource.uri()) {
                return Err(McpError::DuplicateResource(resource.uri().to_string()));
            }
            resources.push(resource.clone());
        }

        let mut prompts: Vec<PromptDescriptor> = Vec::new();
        for prompt in self.prompts.iter() {
            if !enabled_toolsets.contains(prompt.toolset.as_str())
                || excluded.contains(prompt.name())
                || !self.passes_gates(prompt.feature_flag.as_deref(), prompt.insiders_only)
            {
                continue;
            }
            if prompts.iter().any(|p| p.name() == prompt.name()) {
                return Err(McpError::DuplicatePrompt(prompt.name().to_string()));
            }
            prompts.push(prompt.clone());
        }

        let instructions = if self.server_instructions {
            let parts: Vec<&str> = known
                .iter()
                .filter(|t| enabled_toolsets.contains(t.id.as_str()))
                .filter_map(|t| t.instructions.as_deref())
                .filter(|s| !s.trim().is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join("\n\n"))
        } else {
            None
        };

        debug!(
            tools = tools.len(),
            aliases = aliases.len(),
            toolsets = enabled_toolsets.len(),
            "Inventory built"
        );

        Ok(Inventory {
            tools,
            tool_index,
            aliases,
            resources,
            prompts,
            toolsets: known,
            enabled_toolsets,
            unrecognized_toolsets,
            unrecognized_tools,
            instructions,
        })
    }
}

impl std::fmt::Debug for InventoryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryBuilder")
            .field("tools", &self.tools.len())
            .field("enabled_toolsets", &self.enabled_toolsets)
            .field("additional_tools", &self.additional_tools)
            .field("exclude_tools", &self.exclude_tools)
            .field("read_only", &self.read_only)
            .field("insiders_mode", &self.insiders_mode)
            .field("scope_filter", &self.scope_filter)
            .field("owner_repo_optional", &self.owner_repo_optional)
            .finish()
    }
}
