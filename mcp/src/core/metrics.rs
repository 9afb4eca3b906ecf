//! Counters for the scoping pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Metrics for tool calls passing through the scoping layer.
pub struct ScopeMetrics {
    // Call metrics
    total_calls: AtomicU64,
    failed_calls: AtomicU64,

    // Scoping metrics
    injections: AtomicU64,
    owner_denials: AtomicU64,
    repo_denials: AtomicU64,
    roots_unavailable: AtomicU64,

    // Inventory metrics
    inventory_swaps: AtomicU64,

    // Per-tool denial counts
    denials_by_tool: DashMap<String, u64>,
}

impl ScopeMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            injections: AtomicU64::new(0),
            owner_denials: AtomicU64::new(0),
            repo_denials: AtomicU64::new(0),
            roots_unavailable: AtomicU64::new(0),
            inventory_swaps: AtomicU64::new(0),
            denials_by_tool: DashMap::new(),
        }
    }

    /// Record a finished tool call. `failed` covers both error results and
    /// protocol errors.
    pub fn record_call(&self, failed: bool) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_injection(&self) {
        self.injections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_owner_denial(&self, tool: &str) {
        self.owner_denials.fetch_add(1, Ordering::Relaxed);
        self.bump_tool_denial(tool);
    }

    pub fn record_repo_denial(&self, tool: &str) {
        self.repo_denials.fetch_add(1, Ordering::Relaxed);
        self.bump_tool_denial(tool);
    }

    /// Root listing failed, timed out, or was cancelled.
    pub fn record_roots_unavailable(&self) {
        self.roots_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inventory_swap(&self) {
        self.inventory_swaps.fetch_add(1, Ordering::Relaxed);
    }

    fn bump_tool_denial(&self, tool: &str) {
        *self.denials_by_tool.entry(tool.to_string()).or_insert(0) += 1;
    }

    pub fn denials_for_tool(&self, tool: &str) -> u64 {
        self.denials_by_tool.get(tool).map(|v| *v).unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            injections: self.injections.load(Ordering::Relaxed),
            owner_denials: self.owner_denials.load(Ordering::Relaxed),
            repo_denials: self.repo_denials.load(Ordering::Relaxed),
            roots_unavailable: self.roots_unavailable.load(Ordering::Relaxed),
            inventory_swaps: self.inventory_swaps.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.failed_calls.store(0, Ordering::Relaxed);
        self.injections.store(0, Ordering::Relaxed);
        self.owner_denials.store(0, Ordering::Relaxed);
        self.repo_denials.store(0, Ordering::Relaxed);
        self.roots_unavailable.store(0, Ordering::Relaxed);
        // Swaps describe server lifetime, not traffic
        self.denials_by_tool.clear();
    }
}

impl Default for ScopeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ScopeMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub failed_calls: u64,
    pub injections: u64,
    pub owner_denials: u64,
    pub repo_denials: u64,
    pub roots_unavailable: u64,
    pub inventory_swaps: u64,
}

impl MetricsSnapshot {
    pub fn total_denials(&self) -> u64 {
        self.owner_denials + self.repo_denials
    }

    /// Share of calls denied by root enforcement, as a percentage.
    pub fn denial_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            (self.total_denials() as f64 / self.total_calls as f64) * 100.0
        }
    }
}
