//! Store capability boundary.
//!
//! The real persistence engine is out of scope; the reconciler talks to an
//! abstract [`CatalogStore`] injected into every component. This replaces
//! the ambient global connection the legacy system relied on and lets the
//! test suite substitute an in-memory implementation.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::entities::{
    CatalogItem, DeclaredAttribute, ItemId, ItemKind, ItemPage, Term, TermId, TermRef, Variant,
    VariantId,
};

/// Typed store failures. The variants mirror the error taxonomy the batch
/// driver needs: `Unavailable` is the only retryable class; everything else
/// is either skipped per-unit or surfaced as a hard failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("slug '{slug}' already exists in {category}")]
    SlugConflict { category: String, slug: String },

    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether the caller should resubmit the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write capability over categories, terms, items and children.
///
/// All mutations are durable per call ("per statement"); the reconciler
/// sequences them so that a crash between calls leaves records in a
/// re-repairable state rather than a corrupted one.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // --- items ---------------------------------------------------------

    /// Fetch one page of items of the given kinds. `page` is 1-based.
    /// Returns the page plus the total item/page counts for the filter.
    async fn fetch_items_page(
        &self,
        kinds: &[ItemKind],
        page: u32,
        page_size: u32,
    ) -> StoreResult<ItemPage>;

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<CatalogItem>>;

    /// Replace an item's declared category -> attribute mapping.
    async fn update_item_attributes(
        &self,
        id: ItemId,
        attributes: &BTreeMap<String, DeclaredAttribute>,
    ) -> StoreResult<()>;

    /// Items whose declaration for `category` carries `term`.
    async fn items_with_term(&self, category: &str, term: TermId) -> StoreResult<Vec<ItemId>>;

    /// Additively tag an item with a term (never replaces existing tags).
    async fn append_item_term(
        &self,
        item: ItemId,
        category: &str,
        term: TermId,
    ) -> StoreResult<()>;

    // --- variants ------------------------------------------------------

    async fn children_of(&self, item: ItemId) -> StoreResult<Vec<VariantId>>;

    async fn get_variant(&self, id: VariantId) -> StoreResult<Option<Variant>>;

    async fn set_variant_entry(&self, id: VariantId, key: &str, value: &str) -> StoreResult<()>;

    async fn delete_variant_entry(&self, id: VariantId, key: &str) -> StoreResult<()>;

    /// Store-side rewrite of every child entry `(key, old_value)` to
    /// `new_value`, across all items. Returns the number of entries touched.
    async fn bulk_rewrite_variant_entries(
        &self,
        key: &str,
        old_value: &str,
        new_value: &str,
    ) -> StoreResult<u64>;

    // --- terms ---------------------------------------------------------

    /// All terms of one category, in declaration order.
    async fn terms_of(&self, category: &str) -> StoreResult<Vec<Term>>;

    async fn find_term_by_name(&self, category: &str, name: &str) -> StoreResult<Option<Term>>;

    async fn find_term_by_slug(&self, category: &str, slug: &str) -> StoreResult<Option<Term>>;

    /// Cross-taxonomy lookup by id. The result names its owning taxonomy so
    /// callers can detect hits on foreign record types.
    async fn get_term(&self, id: TermId) -> StoreResult<Option<TermRef>>;

    /// Create a term; fails with [`StoreError::SlugConflict`] when the slug
    /// is already taken within the category.
    async fn create_term(&self, category: &str, name: &str, slug: &str) -> StoreResult<Term>;

    /// Rename a term and/or replace its slug.
    async fn update_term(
        &self,
        category: &str,
        id: TermId,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> StoreResult<()>;

    async fn delete_term(&self, category: &str, id: TermId) -> StoreResult<()>;

    /// Existence check by name or slug within one category.
    async fn term_exists(&self, category: &str, name_or_slug: &str) -> StoreResult<bool> {
        if self.find_term_by_name(category, name_or_slug).await?.is_some() {
            return Ok(true);
        }
        Ok(self.find_term_by_slug(category, name_or_slug).await?.is_some())
    }
}
