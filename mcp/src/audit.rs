//! Audit trail for root injection and enforcement decisions.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_ENTRIES: usize = 10000;

/// What happened to a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditKind {
    /// Arguments were filled from roots.
    Injected {
        owner: Option<String>,
        repo: Option<String>,
    },
    /// The call was rejected as out of scope.
    Denied {
        owner: String,
        repo: Option<String>,
        reason: String,
    },
}

impl AuditKind {
    pub fn is_denial(&self) -> bool {
        matches!(self, AuditKind::Denied { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
    #[serde(flatten)]
    pub kind: AuditKind,
}

impl AuditEntry {
    pub fn new(tool_name: impl Into<String>, kind: AuditKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            tool_name: tool_name.into(),
            kind,
        }
    }
}

/// Bounded, thread-safe audit log. The oldest entries fall off first.
#[derive(Debug)]
pub struct AuditLog {
    entries: RwLock<VecDeque<AuditEntry>>,
    max_entries: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_entries.min(1024))),
            max_entries,
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn record_injection(&self, tool: &str, owner: Option<&str>, repo: Option<&str>) {
        self.record(AuditEntry::new(
            tool,
            AuditKind::Injected {
                owner: owner.map(str::to_string),
                repo: repo.map(str::to_string),
            },
        ));
    }

    pub fn record_denial(&self, tool: &str, owner: &str, repo: Option<&str>, reason: &str) {
        self.record(AuditEntry::new(
            tool,
            AuditKind::Denied {
                owner: owner.to_string(),
                repo: repo.map(str::to_string),
                reason: reason.to_string(),
            },
        ));
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read();
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn for_tool(&self, tool: &str, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read();
        entries
            .iter()
            .rev()
            .filter(|e| e.tool_name == tool)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn denials(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read();
        entries
            .iter()
            .rev()
            .filter(|e| e.kind.is_denial())
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
