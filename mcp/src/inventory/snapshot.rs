//! Immutable inventory snapshot.
//!
//! An [`Inventory`] is produced by [`super::InventoryBuilder::build`] and never
//! edited afterwards. Readers hold an `Arc<Inventory>` for the duration of a
//! call; changes publish a whole new snapshot (see [`LiveInventory`]).

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use arc_swap::ArcSwap;
use rmcp::model::{Prompt, RawResource, Tool};
use serde::Serialize;

use super::types::{PromptDescriptor, ResourceDescriptor, ToolDescriptor, ToolsetMetadata};

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub(super) tools: Vec<ToolDescriptor>,
    pub(super) tool_index: HashMap<String, usize>,
    /// Deprecated name -> canonical name, only for canonical names present.
    pub(super) aliases: BTreeMap<String, String>,
    pub(super) resources: Vec<ResourceDescriptor>,
    pub(super) prompts: Vec<PromptDescriptor>,
    /// Every known toolset, in declaration order.
    pub(super) toolsets: Vec<ToolsetMetadata>,
    pub(super) enabled_toolsets: BTreeSet<String>,
    pub(super) unrecognized_toolsets: Vec<String>,
    pub(super) unrecognized_tools: Vec<String>,
    pub(super) instructions: Option<String>,
}

impl Inventory {
    /// An inventory with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a tool by name or deprecated alias.
    pub fn get_tool(&self, name: &str) -> Option<&ToolDescriptor> {
        let canonical = self.resolve_name(name)?;
        self.tool_index.get(canonical).map(|&i| &self.tools[i])
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.get_tool(name).is_some()
    }

    /// Canonical name for `name`, following a deprecated alias if needed.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.tool_index.contains_key(name) {
            return Some(name);
        }
        self.aliases.get(name).map(String::as_str)
    }

    /// Tools in resolution order.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Wire definitions for `tools/list`. Aliases are not listed.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|d| d.tool.clone()).collect()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|d| d.name()).collect()
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    pub fn list_resources(&self) -> Vec<RawResource> {
        self.resources.iter().map(|r| r.resource.clone()).collect()
    }

    pub fn get_resource(&self, uri: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.uri() == uri)
    }

    pub fn prompts(&self) -> &[PromptDescriptor] {
        &self.prompts
    }

    pub fn list_prompts(&self) -> Vec<Prompt> {
        self.prompts.iter().map(|p| p.prompt.clone()).collect()
    }

    pub fn get_prompt(&self, name: &str) -> Option<&PromptDescriptor> {
        self.prompts.iter().find(|p| p.name() == name)
    }

    /// Every toolset the catalog knows about, enabled or not.
    pub fn toolsets(&self) -> &[ToolsetMetadata] {
        &self.toolsets
    }

    pub fn toolset(&self, id: &str) -> Option<&ToolsetMetadata> {
        self.toolsets.iter().find(|t| t.id.as_str() == id)
    }

    pub fn is_toolset_enabled(&self, id: &str) -> bool {
        self.enabled_toolsets.contains(id)
    }

    pub fn enabled_toolsets(&self) -> &BTreeSet<String> {
        &self.enabled_toolsets
    }

    /// Toolset names from the selection that matched nothing.
    pub fn unrecognized_toolsets(&self) -> &[String] {
        &self.unrecognized_toolsets
    }

    /// Explicit tool names that matched nothing in the catalog.
    pub fn unrecognized_tools(&self) -> &[String] {
        &self.unrecognized_tools
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn summary(&self) -> InventorySummary {
        InventorySummary {
            tools: self.tool_names().into_iter().map(str::to_string).collect(),
            aliases: self.aliases.clone(),
            enabled_toolsets: self.enabled_toolsets.iter().cloned().collect(),
            resources: self.resources.iter().map(|r| r.uri().to_string()).collect(),
            prompts: self.prompts.iter().map(|p| p.name().to_string()).collect(),
            unrecognized_toolsets: self.unrecognized_toolsets.clone(),
            unrecognized_tools: self.unrecognized_tools.clone(),
        }
    }
}

/// Serializable overview of an inventory, for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    pub tools: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    pub enabled_toolsets: Vec<String>,
    pub resources: Vec<String>,
    pub prompts: Vec<String>,
    pub unrecognized_toolsets: Vec<String>,
    pub unrecognized_tools: Vec<String>,
}

/// Shared handle to the current snapshot.
///
/// Readers call [`LiveInventory::load`] once per call and keep that snapshot.
/// Writers publish whole snapshots; nothing is edited in place.
#[derive(Clone)]
pub struct LiveInventory {
    current: Arc<ArcSwap<Inventory>>,
}

impl LiveInventory {
    pub fn new(initial: Inventory) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn load(&self) -> Arc<Inventory> {
        self.current.load_full()
    }

    /// Publish `next`, returning the snapshot it replaced.
    pub fn publish(&self, next: Inventory) -> Arc<Inventory> {
        self.current.swap(Arc::new(next))
    }
}

impl std::fmt::Debug for LiveInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("LiveInventory")
            .field("tools", &snapshot.len())
            .field("enabled_toolsets", &snapshot.enabled_toolsets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryBuilder;

    fn tool(toolset: &str, name: &str) -> ToolDescriptor {
        ToolDescriptor::new(toolset, name, "test", serde_json::json!({"type": "object"}))
    }

    fn sample() -> Inventory {
        InventoryBuilder::new()
            .set_toolsets(vec![ToolsetMetadata::new("repos", "Repos").with_default(true)])
            .set_tools(vec![tool("repos", "get_file_contents"), tool("repos", "list_branches")])
            .with_deprecated_aliases([("get_file", "get_file_contents")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_by_name_and_alias() {
        let inv = sample();
        assert!(inv.has_tool("get_file_contents"));
        assert_eq!(
            inv.get_tool("get_file").map(|d| d.name()),
            Some("get_file_contents")
        );
        assert_eq!(inv.resolve_name("get_file"), Some("get_file_contents"));
        assert_eq!(inv.resolve_name("missing"), None);
        // Aliases resolve but are not advertised
        assert_eq!(inv.list_tools().len(), 2);
    }

    #[test]
    fn test_summary() {
        let summary = sample().summary();
        assert_eq!(summary.tools, vec!["get_file_contents", "list_branches"]);
        assert_eq!(summary.enabled_toolsets, vec!["repos"]);
        assert_eq!(
            summary.aliases.get("get_file").map(String::as_str),
            Some("get_file_contents")
        );
    }

    #[test]
    fn test_live_inventory_swap() {
        let live = LiveInventory::new(Inventory::empty());
        let before = live.load();
        assert!(before.is_empty());

        let replaced = live.publish(sample());
        assert!(replaced.is_empty());
        // A reader holding the old snapshot still sees it unchanged
        assert!(before.is_empty());
        assert_eq!(live.load().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_whole_snapshots() {
        let live = LiveInventory::new(sample());
        let mut handles = vec![];
        for i in 0..8 {
            let live = live.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    live.publish(Inventory::empty());
                } else {
                    live.publish(sample());
                }
                let snapshot = live.load();
                // Either snapshot is acceptable; a mix is not
                assert!(snapshot.len() == 0 || snapshot.len() == 2);
                assert_eq!(snapshot.tool_index.len(), snapshot.len());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
