//! Runtime toolset enable/disable.
//!
//! Every change rebuilds the inventory from the builder template with the new
//! toolset selection and publishes it as a fresh snapshot. Calls already in
//! flight keep the snapshot they loaded.

pub mod tools;

use std::{collections::BTreeSet, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

pub use tools::{
    dynamic_tool_descriptors, DisableToolsetTool, EnableToolsetTool, GetToolsetToolsTool,
    ListAvailableToolsetsTool, DISABLE_TOOLSET, DYNAMIC_TOOLSET, ENABLE_TOOLSET,
    GET_TOOLSET_TOOLS, LIST_AVAILABLE_TOOLSETS,
};

use crate::{
    core::metrics::ScopeMetrics,
    error::{McpError, McpResult},
    inventory::{Inventory, InventoryBuilder, LiveInventory},
};

/// One toolset as reported by `list_available_toolsets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolsetStatus {
    pub name: String,
    pub description: String,
    pub can_enable: bool,
    pub currently_enabled: bool,
}

/// One tool as reported by `get_toolset_tools`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolsetToolInfo {
    pub name: String,
    pub description: String,
    pub can_enable: bool,
    pub toolset: String,
}

pub struct DynamicToolsets {
    template: InventoryBuilder,
    live: LiveInventory,
    /// Serializes writers; readers go through `live`.
    enabled: Mutex<BTreeSet<String>>,
    metrics: Option<Arc<ScopeMetrics>>,
}

impl DynamicToolsets {
    /// Controller over `live`, starting from the toolsets its current
    /// snapshot has enabled.
    pub fn new(template: InventoryBuilder, live: LiveInventory) -> Self {
        let enabled = live.load().enabled_toolsets().clone();
        Self {
            template,
            live,
            enabled: Mutex::new(enabled),
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<ScopeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn live(&self) -> &LiveInventory {
        &self.live
    }

    pub fn snapshot(&self) -> Arc<Inventory> {
        self.live.load()
    }

    pub fn is_enabled(&self, toolset: &str) -> bool {
        self.enabled.lock().contains(toolset)
    }

    pub fn enabled(&self) -> BTreeSet<String> {
        self.enabled.lock().clone()
    }

    /// Enable `toolset`. Returns `false` if it already was.
    pub fn enable(&self, toolset: &str) -> McpResult<bool> {
        self.update(toolset, true)
    }

    /// Disable `toolset`. Returns `false` if it already was.
    pub fn disable(&self, toolset: &str) -> McpResult<bool> {
        self.update(toolset, false)
    }

    fn update(&self, toolset: &str, enable: bool) -> McpResult<bool> {
        if !self.template.is_known_toolset(toolset) {
            return Err(McpError::UnknownToolset(toolset.to_string()));
        }

        let mut enabled = self.enabled.lock();
        if enabled.contains(toolset) == enable {
            return Ok(false);
        }

        let mut next = enabled.clone();
        if enable {
            next.insert(toolset.to_string());
        } else {
            next.remove(toolset);
        }

        let inventory = self
            .template
            .clone()
            .with_toolsets(Some(next.iter().cloned().collect()))
            .build()?;
        let tools = inventory.len();
        self.live.publish(inventory);
        *enabled = next;

        if let Some(metrics) = &self.metrics {
            metrics.record_inventory_swap();
        }
        info!(
            toolset = %toolset,
            enabled = enable,
            tools = tools,
            "Toolset selection changed"
        );
        Ok(true)
    }

    pub fn available(&self) -> Vec<ToolsetStatus> {
        let enabled = self.enabled.lock();
        self.template
            .known_toolsets()
            .into_iter()
            .map(|meta| ToolsetStatus {
                currently_enabled: enabled.contains(meta.id.as_str()),
                name: meta.id.to_string(),
                description: meta.description,
                can_enable: true,
            })
            .collect()
    }

    /// Tools of `toolset` that would be exposed once it is enabled.
    pub fn toolset_tools(&self, toolset: &str) -> McpResult<Vec<ToolsetToolInfo>> {
        if !self.template.is_known_toolset(toolset) {
            return Err(McpError::UnknownToolset(toolset.to_string()));
        }
        let preview = self
            .template
            .clone()
            .with_toolsets(Some(vec![toolset.to_string()]))
            .with_tools(Vec::new())
            .build()?;
        Ok(preview
            .tools()
            .iter()
            .map(|tool| ToolsetToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                can_enable: true,
                toolset: tool.toolset.to_string(),
            })
            .collect())
    }
}

impl std::fmt::Debug for DynamicToolsets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicToolsets")
            .field("enabled", &*self.enabled.lock())
            .finish()
    }
}
