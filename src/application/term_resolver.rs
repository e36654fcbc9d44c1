//! Term identity resolution.
//!
//! Given a source term and a destination category, decide whether an
//! equivalent destination term already exists and create one only when it
//! does not. This is the de-duplication path that keeps repeated merge runs
//! idempotent: the same-name lookup always wins over creation.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::entities::{Term, TermId};
use crate::domain::store::{CatalogStore, StoreError};

/// Placeholder id handed out in dry-run mode. Store-assigned ids grow from
/// 1, so the sentinel never collides with a real term.
pub const DRY_RUN_TERM_ID: TermId = TermId::MAX;

pub struct TermResolver {
    store: Arc<dyn CatalogStore>,
}

impl TermResolver {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Resolve `source` into `target_category`.
    ///
    /// Order matters: (1) same name already present -> reuse it;
    /// (2) create carrying the source's name and slug; (3) creation lost a
    /// slug race (or a prior partial run got there first) -> fall back to
    /// the slug lookup. `Ok(None)` means the sub-step is abandoned; callers
    /// skip the value and continue.
    pub async fn resolve(
        &self,
        source: &Term,
        target_category: &str,
        dry_run: bool,
    ) -> Result<Option<Term>> {
        if dry_run {
            // No mutation in dry runs; the stable placeholder keeps the
            // downstream counting paths identical to a live run.
            return Ok(Some(Term {
                id: DRY_RUN_TERM_ID,
                name: source.name.clone(),
                slug: source.slug.clone(),
            }));
        }

        if let Some(existing) = self
            .store
            .find_term_by_name(target_category, &source.name)
            .await?
        {
            debug!(term = %source.name, category = target_category, "reusing existing term");
            return Ok(Some(existing));
        }

        match self
            .store
            .create_term(target_category, &source.name, &source.slug)
            .await
        {
            Ok(created) => Ok(Some(created)),
            Err(StoreError::SlugConflict { .. }) => {
                let fallback = self
                    .store
                    .find_term_by_slug(target_category, &source.slug)
                    .await?;
                if fallback.is_none() {
                    warn!(
                        slug = %source.slug,
                        category = target_category,
                        "slug conflict with no recoverable term; sub-step skipped"
                    );
                }
                Ok(fallback)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Translate a child's old slug from a source category into the target
    /// category: dereference the slug to its name in the source, then find
    /// the same-named term in the target. Used when the merge pass has no
    /// entry for the slug in its translation map.
    pub async fn translate_slug(
        &self,
        old_slug: &str,
        source_category: &str,
        target_category: &str,
        dry_run: bool,
    ) -> Result<Option<String>> {
        if dry_run {
            return Ok(Some(old_slug.to_string()));
        }
        let Some(source_term) = self
            .store
            .find_term_by_slug(source_category, old_slug)
            .await?
        else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_term_by_name(target_category, &source_term.name)
            .await?
            .map(|t| t.slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        CatalogItem, DeclaredAttribute, ItemId, ItemKind, ItemPage, TermRef, Variant, VariantId,
    };
    use crate::domain::store::StoreResult;
    use crate::infrastructure::MemoryCatalogStore;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    fn source_red() -> Term {
        Term {
            id: 1,
            name: "Red".to_string(),
            slug: "red".to_string(),
        }
    }

    #[tokio::test]
    async fn slug_conflict_recovers_the_existing_term() {
        let store = Arc::new(MemoryCatalogStore::new());
        // Same slug, different name: the name lookup misses, the create
        // collides, and the fallback must hand back the squatting term.
        let squatter = store.seed_term("pa_color", "Rouge", "red").await;

        let resolver = TermResolver::new(store);
        let resolved = resolver
            .resolve(&source_red(), "pa_color", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, squatter.id);
        assert_eq!(resolved.name, "Rouge");
    }

    /// Store where every create collides and no lookup finds anything,
    /// modelling a conflict raised by state the adapter cannot read back
    /// (e.g. a row deleted between the failed insert and the re-fetch).
    struct AlwaysConflicting;

    #[async_trait]
    impl CatalogStore for AlwaysConflicting {
        async fn fetch_items_page(
            &self,
            _kinds: &[ItemKind],
            _page: u32,
            _page_size: u32,
        ) -> StoreResult<ItemPage> {
            unimplemented!()
        }
        async fn get_item(&self, _id: ItemId) -> StoreResult<Option<CatalogItem>> {
            unimplemented!()
        }
        async fn update_item_attributes(
            &self,
            _id: ItemId,
            _attributes: &BTreeMap<String, DeclaredAttribute>,
        ) -> StoreResult<()> {
            unimplemented!()
        }
        async fn items_with_term(&self, _category: &str, _term: TermId) -> StoreResult<Vec<ItemId>> {
            unimplemented!()
        }
        async fn append_item_term(
            &self,
            _item: ItemId,
            _category: &str,
            _term: TermId,
        ) -> StoreResult<()> {
            unimplemented!()
        }
        async fn children_of(&self, _item: ItemId) -> StoreResult<Vec<VariantId>> {
            unimplemented!()
        }
        async fn get_variant(&self, _id: VariantId) -> StoreResult<Option<Variant>> {
            unimplemented!()
        }
        async fn set_variant_entry(
            &self,
            _id: VariantId,
            _key: &str,
            _value: &str,
        ) -> StoreResult<()> {
            unimplemented!()
        }
        async fn delete_variant_entry(&self, _id: VariantId, _key: &str) -> StoreResult<()> {
            unimplemented!()
        }
        async fn bulk_rewrite_variant_entries(
            &self,
            _key: &str,
            _old_value: &str,
            _new_value: &str,
        ) -> StoreResult<u64> {
            unimplemented!()
        }
        async fn terms_of(&self, _category: &str) -> StoreResult<Vec<Term>> {
            unimplemented!()
        }
        async fn find_term_by_name(&self, _category: &str, _name: &str) -> StoreResult<Option<Term>> {
            Ok(None)
        }
        async fn find_term_by_slug(&self, _category: &str, _slug: &str) -> StoreResult<Option<Term>> {
            Ok(None)
        }
        async fn get_term(&self, _id: TermId) -> StoreResult<Option<TermRef>> {
            unimplemented!()
        }
        async fn create_term(&self, category: &str, _name: &str, slug: &str) -> StoreResult<Term> {
            Err(StoreError::SlugConflict {
                category: category.to_string(),
                slug: slug.to_string(),
            })
        }
        async fn update_term(
            &self,
            _category: &str,
            _id: TermId,
            _name: Option<&str>,
            _slug: Option<&str>,
        ) -> StoreResult<()> {
            unimplemented!()
        }
        async fn delete_term(&self, _category: &str, _id: TermId) -> StoreResult<()> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn unrecoverable_conflict_abandons_the_sub_step() {
        let resolver = TermResolver::new(Arc::new(AlwaysConflicting));
        let resolved = resolver.resolve(&source_red(), "pa_color", false).await.unwrap();
        assert!(resolved.is_none(), "no term to fall back to means Ok(None)");
    }

    #[tokio::test]
    async fn fresh_name_is_created_and_dry_run_gets_the_placeholder() {
        let store = Arc::new(MemoryCatalogStore::new());
        let resolver = TermResolver::new(Arc::clone(&store) as Arc<dyn CatalogStore>);

        let dry = resolver
            .resolve(&source_red(), "pa_color", true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dry.id, DRY_RUN_TERM_ID);
        assert_eq!(store.write_count().await, 0);

        let created = resolver
            .resolve(&source_red(), "pa_color", false)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(created.id, DRY_RUN_TERM_ID);
        assert!(store
            .find_term_by_slug("pa_color", "red")
            .await
            .unwrap()
            .is_some());
    }
}
