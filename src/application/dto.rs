//! Data Transfer Objects for the reconciliation surface
//!
//! Contains the batch step request/response contract exchanged with the
//! external caller (UI polling loop), the explicit resume cursor, and the
//! per-item outcome records the operations report upward.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::ItemId;

// ============================================================================
// Batch step contract
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Merge,
    Repair,
    Rescue,
}

/// Explicit resume state. The server keeps no session: the caller carries
/// the cursor it received and resubmits it (unchanged on retry, advanced on
/// success) with each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCursor {
    /// 1-based page number to process next.
    pub page: u32,
}

impl BatchCursor {
    pub fn start() -> Self {
        Self { page: 1 }
    }

    pub fn advanced(self) -> Self {
        Self { page: self.page + 1 }
    }
}

impl Default for BatchCursor {
    fn default() -> Self {
        Self::start()
    }
}

/// One page-step request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStepRequest {
    pub operation: OperationKind,
    /// Target category (merge) or the category to rescue. Unused by repair.
    #[serde(default)]
    pub target_category: Option<String>,
    /// Source categories to consolidate; merge only.
    #[serde(default)]
    pub source_categories: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub cursor: BatchCursor,
}

/// One page-step response. `total_items` is only meaningful on the first
/// page; callers cache it for progress rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStepResponse {
    pub done: bool,
    pub items_processed: u32,
    pub total_items: u64,
    /// Screen lines accumulated this page, for progress display.
    pub log: String,
    /// Cursor to submit for the next step; meaningless when `done`.
    pub next_cursor: BatchCursor,
    /// Stamped per response; lets operators correlate audit lines.
    pub run_id: Uuid,
}

// ============================================================================
// Per-item outcomes
// ============================================================================

/// Outcome of reconciling one item. Shape is identical for dry and live
/// runs so progress rendering does not depend on the mode.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemOutcome {
    pub item_id: ItemId,
    /// Action label recorded in the audit log; empty for no-ops.
    pub action: String,
    /// Whether this unit found anything to report (live or dry).
    pub state_changing: bool,
    /// Defect entries / child references found before the unit ran.
    pub before: u32,
    /// Children confirmed correct / changed after the unit ran.
    pub after: u32,
    pub wildcard: bool,
    pub detail: String,
    /// Screen line appended to the audit log; empty when nothing was logged.
    pub log_line: String,
}

impl ItemOutcome {
    /// A unit that found nothing to do. Not an error and not audited.
    pub fn noop(item_id: ItemId, detail: impl Into<String>) -> Self {
        Self {
            item_id,
            detail: detail.into(),
            ..Self::default()
        }
    }
}

/// Action taken for one term during a rescue pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RescueAction {
    /// Numeric name dereferenced to a foreign record type; left alone.
    Skipped,
    /// Numeric-named term merged into the existing true-named term.
    Merged,
    /// Numeric-named term renamed in place to its true name.
    Renamed,
    /// Numeric slug regenerated from the (possibly fixed) name.
    SlugFixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RescueOutcome {
    pub term_id: crate::domain::entities::TermId,
    pub action: RescueAction,
    pub detail: String,
    pub log_line: String,
}
