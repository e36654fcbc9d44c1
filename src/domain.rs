//! Domain module - core attribute model and boundaries
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod audit;
pub mod entities;
pub mod matching;
pub mod slug;
pub mod store;

// Re-export commonly used items for convenience
pub use audit::{AuditEntry, AuditSink};
pub use entities::{
    CatalogItem, DeclaredAttribute, ItemId, ItemKind, ItemPage, Term, TermId, TermRef, Variant,
    VariantId,
};
pub use matching::TrustedTerms;
pub use store::{CatalogStore, StoreError, StoreResult};
