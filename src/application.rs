//! Application layer module
//!
//! The reconciliation operations and the batch driver that pages over the
//! catalog, plus the DTOs exchanged with the external caller.

pub mod batch;
pub mod dto;
pub mod inspector;
pub mod merge;
pub mod repair;
pub mod rescue;
pub mod term_resolver;
pub mod variant_rewriter;

pub use batch::{is_retryable, BatchDriver};
pub use dto::{
    BatchCursor, BatchStepRequest, BatchStepResponse, ItemOutcome, OperationKind, RescueAction,
    RescueOutcome,
};
pub use inspector::{Inspector, ItemReport, VariantStatus};
pub use merge::MergeOperation;
pub use repair::RepairOperation;
pub use rescue::RescueOperation;
pub use term_resolver::{TermResolver, DRY_RUN_TERM_ID};
pub use variant_rewriter::{EntryMove, VariantRewriter};
