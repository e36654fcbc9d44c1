//! Catalog attribute reconciliation engine.
//!
//! Merges redundant attribute categories, repairs broken child attribute
//! entries and rescues numerically-corrupted terms, over an abstract catalog
//! store. Every destructive operation has a dry-run mode and writes to an
//! append-only audit log.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::batch::BatchDriver;
pub use application::dto::{BatchStepRequest, BatchStepResponse, OperationKind};
pub use domain::store::{CatalogStore, StoreError};
