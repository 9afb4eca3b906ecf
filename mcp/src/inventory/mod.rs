//! Tool inventory: catalog descriptors, filtering, and published snapshots.
//!
//! The catalog (toolsets, tools, resources, prompts) is fed into an
//! [`InventoryBuilder`] together with the configuration axes. `build()`
//! resolves them into an immutable [`Inventory`], which the server publishes
//! through a [`LiveInventory`] handle.

pub mod builder;
pub mod filters;
pub mod schema;
pub mod snapshot;
pub mod types;

pub use builder::InventoryBuilder;
pub use filters::{expand_scopes, feature_checker_from_list, FeatureChecker, FeatureGate, ScopeFilter};
pub use schema::{make_all_owner_repo_optional, make_owner_repo_optional, ROOTS_OPTIONAL_NOTE};
pub use snapshot::{Inventory, InventorySummary, LiveInventory};
pub use types::{
    PromptDescriptor, ResourceDescriptor, ToolDescriptor, ToolsetId, ToolsetMetadata,
    ALL_TOOLSETS, DEFAULT_TOOLSETS,
};
