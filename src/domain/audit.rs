//! Audit records and the sink they are appended to.
//!
//! The audit log is a durable data artifact, not telemetry: operators replay
//! it to verify what the reconciler did to which record. Sinks are
//! append-only; this crate never truncates or rewrites entries.

use crate::domain::entities::ItemId;

/// One completed unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Operation label: MERGE, REPAIR, RESCUE, MANUAL.
    pub operation: String,
    /// Item the unit applied to, when there was one.
    pub item: Option<ItemId>,
    /// Action label, e.g. LIVE, DRY, RENAME, SKIP, FIX ORPHANS/GHOSTS.
    pub action: String,
    /// Affected sub-records before the unit ran.
    pub before: u32,
    /// Affected sub-records after the unit ran.
    pub after: u32,
    /// Whether any variation axis was left in the Any wildcard state.
    pub wildcard: bool,
    /// Free-text detail for manual verification.
    pub detail: String,
}

impl AuditEntry {
    pub fn new(operation: &str, item: Option<ItemId>, action: &str, detail: impl Into<String>) -> Self {
        Self {
            operation: operation.to_string(),
            item,
            action: action.to_string(),
            before: 0,
            after: 0,
            wildcard: false,
            detail: detail.into(),
        }
    }

    pub fn with_counts(mut self, before: u32, after: u32, wildcard: bool) -> Self {
        self.before = before;
        self.after = after;
        self.wildcard = wildcard;
        self
    }

    /// Item id field as rendered in the log ("N/A" for item-less units).
    pub fn item_label(&self) -> String {
        self.item
            .map_or_else(|| "N/A".to_string(), |id| id.to_string())
    }

    pub fn wildcard_label(&self) -> &'static str {
        if self.wildcard { "YES" } else { "NO" }
    }

    /// Human-readable line returned to the caller for progress display.
    pub fn screen_line(&self) -> String {
        format!(
            "{} | {} | {} | Before:{} -> After:{} | Any:{} | {}\n",
            self.operation,
            self.item_label(),
            self.action,
            self.before,
            self.after,
            self.wildcard_label(),
            self.detail
        )
    }
}

/// Append-only audit destination. Returns the screen line for the entry so
/// batch responses can carry it upward without re-rendering.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> anyhow::Result<String>;
}
