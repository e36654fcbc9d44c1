//! In-memory catalog store.
//!
//! Reference implementation of [`CatalogStore`] used by the test suite and
//! for demo runs. Behaves like the real store in the ways that matter here:
//! slug uniqueness per taxonomy, weak slug references from children, and
//! dangling term ids left behind in item declarations after a term delete.
//! Also counts mutations so tests can assert the dry-run zero-write rule,
//! and can fail the next page fetch to exercise the retry path.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::entities::{
    CatalogItem, DeclaredAttribute, ItemId, ItemKind, ItemPage, Term, TermId, TermRef, Variant,
    VariantId,
};
use crate::domain::store::{CatalogStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredTerm {
    taxonomy: String,
    name: String,
    slug: String,
}

#[derive(Debug, Default)]
struct Inner {
    next_term_id: TermId,
    next_item_id: ItemId,
    next_variant_id: VariantId,
    terms: BTreeMap<TermId, StoredTerm>,
    /// Declaration order of terms per taxonomy.
    taxonomy_terms: BTreeMap<String, Vec<TermId>>,
    items: BTreeMap<ItemId, CatalogItem>,
    variants: BTreeMap<VariantId, Variant>,
    writes: u64,
    fail_next_page_fetch: bool,
}

#[derive(Default)]
pub struct MemoryCatalogStore {
    inner: RwLock<Inner>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- seeding / assertion helpers ------------------------------------

    pub async fn seed_term(&self, taxonomy: &str, name: &str, slug: &str) -> Term {
        let mut inner = self.inner.write().await;
        inner.next_term_id += 1;
        let id = inner.next_term_id;
        inner.terms.insert(
            id,
            StoredTerm {
                taxonomy: taxonomy.to_string(),
                name: name.to_string(),
                slug: slug.to_string(),
            },
        );
        inner
            .taxonomy_terms
            .entry(taxonomy.to_string())
            .or_default()
            .push(id);
        Term {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }

    /// Seed a term under a specific id (rescue tests need a term whose id
    /// equals some other term's numeric name).
    pub async fn seed_term_with_id(&self, id: TermId, taxonomy: &str, name: &str, slug: &str) -> Term {
        let mut inner = self.inner.write().await;
        inner.next_term_id = inner.next_term_id.max(id);
        inner.terms.insert(
            id,
            StoredTerm {
                taxonomy: taxonomy.to_string(),
                name: name.to_string(),
                slug: slug.to_string(),
            },
        );
        inner
            .taxonomy_terms
            .entry(taxonomy.to_string())
            .or_default()
            .push(id);
        Term {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }

    pub async fn seed_item(&self, name: &str, kind: ItemKind) -> ItemId {
        let mut inner = self.inner.write().await;
        inner.next_item_id += 1;
        let id = inner.next_item_id;
        inner.items.insert(
            id,
            CatalogItem {
                id,
                name: name.to_string(),
                kind,
                attributes: BTreeMap::new(),
            },
        );
        id
    }

    pub async fn declare_attribute(
        &self,
        item: ItemId,
        category: &str,
        options: Vec<TermId>,
        is_variation: bool,
    ) {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.items.get_mut(&item) {
            record.attributes.insert(
                category.to_string(),
                DeclaredAttribute {
                    options,
                    is_variation,
                },
            );
        }
    }

    pub async fn seed_variant(
        &self,
        parent: ItemId,
        entries: &[(&str, &str)],
    ) -> VariantId {
        let mut inner = self.inner.write().await;
        inner.next_variant_id += 1;
        let id = inner.next_variant_id;
        inner.variants.insert(
            id,
            Variant {
                id,
                parent_id: parent,
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        );
        id
    }

    /// Number of mutating store calls performed so far.
    pub async fn write_count(&self) -> u64 {
        self.inner.read().await.writes
    }

    /// Make the next `fetch_items_page` fail with a retryable error.
    pub async fn fail_next_page_fetch(&self) {
        self.inner.write().await.fail_next_page_fetch = true;
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn fetch_items_page(
        &self,
        kinds: &[ItemKind],
        page: u32,
        page_size: u32,
    ) -> StoreResult<ItemPage> {
        let mut inner = self.inner.write().await;
        if inner.fail_next_page_fetch {
            inner.fail_next_page_fetch = false;
            return Err(StoreError::Unavailable {
                reason: "injected page fetch failure".to_string(),
            });
        }
        let matching: Vec<CatalogItem> = inner
            .items
            .values()
            .filter(|item| kinds.contains(&item.kind))
            .cloned()
            .collect();
        let total_count = matching.len() as u64;
        let total_pages = (total_count as u32).div_ceil(page_size.max(1));
        let offset = (page.saturating_sub(1) * page_size) as usize;
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();
        Ok(ItemPage {
            items,
            total_count,
            total_pages,
        })
    }

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<CatalogItem>> {
        Ok(self.inner.read().await.items.get(&id).cloned())
    }

    async fn update_item_attributes(
        &self,
        id: ItemId,
        attributes: &BTreeMap<String, DeclaredAttribute>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.writes += 1;
        match inner.items.get_mut(&id) {
            Some(item) => {
                item.attributes = attributes.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("item", id)),
        }
    }

    async fn items_with_term(&self, category: &str, term: TermId) -> StoreResult<Vec<ItemId>> {
        Ok(self
            .inner
            .read()
            .await
            .items
            .values()
            .filter(|item| {
                item.attributes
                    .get(category)
                    .is_some_and(|attr| attr.options.contains(&term))
            })
            .map(|item| item.id)
            .collect())
    }

    async fn append_item_term(
        &self,
        item: ItemId,
        category: &str,
        term: TermId,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.writes += 1;
        let Some(record) = inner.items.get_mut(&item) else {
            return Err(StoreError::not_found("item", item));
        };
        let attr = record
            .attributes
            .entry(category.to_string())
            .or_insert_with(|| DeclaredAttribute {
                options: Vec::new(),
                is_variation: false,
            });
        if !attr.options.contains(&term) {
            attr.options.push(term);
        }
        Ok(())
    }

    async fn children_of(&self, item: ItemId) -> StoreResult<Vec<VariantId>> {
        Ok(self
            .inner
            .read()
            .await
            .variants
            .values()
            .filter(|v| v.parent_id == item)
            .map(|v| v.id)
            .collect())
    }

    async fn get_variant(&self, id: VariantId) -> StoreResult<Option<Variant>> {
        Ok(self.inner.read().await.variants.get(&id).cloned())
    }

    async fn set_variant_entry(&self, id: VariantId, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.writes += 1;
        match inner.variants.get_mut(&id) {
            Some(variant) => {
                variant.entries.insert(key.to_string(), value.to_string());
                Ok(())
            }
            None => Err(StoreError::not_found("variant", id)),
        }
    }

    async fn delete_variant_entry(&self, id: VariantId, key: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.writes += 1;
        match inner.variants.get_mut(&id) {
            Some(variant) => {
                variant.entries.remove(key);
                Ok(())
            }
            None => Err(StoreError::not_found("variant", id)),
        }
    }

    async fn bulk_rewrite_variant_entries(
        &self,
        key: &str,
        old_value: &str,
        new_value: &str,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        inner.writes += 1;
        let mut touched = 0u64;
        for variant in inner.variants.values_mut() {
            if let Some(value) = variant.entries.get_mut(key) {
                if value == old_value {
                    *value = new_value.to_string();
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }

    async fn terms_of(&self, category: &str) -> StoreResult<Vec<Term>> {
        let inner = self.inner.read().await;
        Ok(inner
            .taxonomy_terms
            .get(category)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| {
                        inner.terms.get(id).map(|t| Term {
                            id: *id,
                            name: t.name.clone(),
                            slug: t.slug.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_term_by_name(&self, category: &str, name: &str) -> StoreResult<Option<Term>> {
        Ok(self
            .terms_of(category)
            .await?
            .into_iter()
            .find(|t| t.name == name))
    }

    async fn find_term_by_slug(&self, category: &str, slug: &str) -> StoreResult<Option<Term>> {
        Ok(self
            .terms_of(category)
            .await?
            .into_iter()
            .find(|t| t.slug == slug))
    }

    async fn get_term(&self, id: TermId) -> StoreResult<Option<TermRef>> {
        Ok(self.inner.read().await.terms.get(&id).map(|t| TermRef {
            id,
            taxonomy: t.taxonomy.clone(),
            name: t.name.clone(),
            slug: t.slug.clone(),
        }))
    }

    async fn create_term(&self, category: &str, name: &str, slug: &str) -> StoreResult<Term> {
        let mut inner = self.inner.write().await;
        let exists = inner
            .taxonomy_terms
            .get(category)
            .is_some_and(|ids| {
                ids.iter()
                    .any(|id| inner.terms.get(id).is_some_and(|t| t.slug == slug))
            });
        if exists {
            return Err(StoreError::SlugConflict {
                category: category.to_string(),
                slug: slug.to_string(),
            });
        }
        inner.writes += 1;
        inner.next_term_id += 1;
        let id = inner.next_term_id;
        inner.terms.insert(
            id,
            StoredTerm {
                taxonomy: category.to_string(),
                name: name.to_string(),
                slug: slug.to_string(),
            },
        );
        inner
            .taxonomy_terms
            .entry(category.to_string())
            .or_default()
            .push(id);
        Ok(Term {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        })
    }

    async fn update_term(
        &self,
        category: &str,
        id: TermId,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        // Same uniqueness rule as the real store: one slug per taxonomy.
        if let Some(slug) = slug {
            let taken = inner.taxonomy_terms.get(category).is_some_and(|ids| {
                ids.iter().any(|tid| {
                    *tid != id && inner.terms.get(tid).is_some_and(|t| t.slug == slug)
                })
            });
            if taken {
                return Err(StoreError::SlugConflict {
                    category: category.to_string(),
                    slug: slug.to_string(),
                });
            }
        }
        inner.writes += 1;
        match inner.terms.get_mut(&id) {
            Some(term) if term.taxonomy == category => {
                if let Some(name) = name {
                    term.name = name.to_string();
                }
                if let Some(slug) = slug {
                    term.slug = slug.to_string();
                }
                Ok(())
            }
            _ => Err(StoreError::not_found("term", id)),
        }
    }

    async fn delete_term(&self, category: &str, id: TermId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.writes += 1;
        if inner
            .terms
            .get(&id)
            .is_none_or(|t| t.taxonomy != category)
        {
            return Err(StoreError::not_found("term", id));
        }
        inner.terms.remove(&id);
        if let Some(ids) = inner.taxonomy_terms.get_mut(category) {
            ids.retain(|tid| *tid != id);
        }
        // Item declarations keep any dangling id on purpose: that is the
        // weak-reference behavior of the real store.
        Ok(())
    }
}
