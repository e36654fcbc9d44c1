//! Single-item merge: consolidate N source categories into one target.
//!
//! For each source category declared on the item, its terms are resolved
//! into the target (reuse-or-create), the source declaration is dropped and
//! the accumulated term ids are unioned with whatever the item already
//! declared on the target. When the merge touches a variation axis, every
//! child entry keyed to a source category is rewritten to the target key
//! using a slug translation map built during the resolution pass.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::application::dto::ItemOutcome;
use crate::application::term_resolver::TermResolver;
use crate::application::variant_rewriter::{EntryMove, VariantRewriter};
use crate::domain::audit::{AuditEntry, AuditSink};
use crate::domain::entities::{CatalogItem, DeclaredAttribute, ItemKind, TermId};
use crate::domain::slug::meta_key;
use crate::domain::store::CatalogStore;

pub struct MergeOperation {
    store: Arc<dyn CatalogStore>,
    resolver: TermResolver,
    rewriter: VariantRewriter,
    audit: Arc<dyn AuditSink>,
}

impl MergeOperation {
    pub fn new(store: Arc<dyn CatalogStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            resolver: TermResolver::new(Arc::clone(&store)),
            rewriter: VariantRewriter::new(Arc::clone(&store)),
            store,
            audit,
        }
    }

    /// Merge `sources` into `target` on one item. An item declaring none of
    /// the sources is a no-op, not an error.
    #[instrument(skip(self, item), fields(item = item.id))]
    pub async fn run_item(
        &self,
        item: &CatalogItem,
        target: &str,
        sources: &[String],
        dry_run: bool,
    ) -> Result<ItemOutcome> {
        let mut attributes = item.attributes.clone();
        let mut found_sources: Vec<String> = Vec::new();
        let mut new_options: Vec<TermId> = Vec::new();
        let mut variation_axis = false;
        // (source category, old slug) -> new slug in the target category.
        let mut slug_map: HashMap<(String, String), String> = HashMap::new();

        for source in sources {
            let Some(attr) = attributes.get(source).cloned() else {
                continue;
            };
            found_sources.push(source.clone());
            if attr.is_variation {
                variation_axis = true;
            }
            for term_id in &attr.options {
                let Some(term_ref) = self.store.get_term(*term_id).await? else {
                    warn!(term = term_id, source = %source, "declared term id no longer resolves; skipped");
                    continue;
                };
                let source_term = term_ref.to_term();
                if let Some(resolved) = self.resolver.resolve(&source_term, target, dry_run).await? {
                    new_options.push(resolved.id);
                    let new_slug = if dry_run {
                        // Placeholder keeps the child counting path live.
                        source_term.slug.clone()
                    } else {
                        resolved.slug.clone()
                    };
                    slug_map.insert((source.clone(), source_term.slug.clone()), new_slug);
                }
            }
            if !dry_run {
                attributes.remove(source);
            }
        }

        if found_sources.is_empty() {
            return Ok(ItemOutcome::noop(item.id, "no source categories declared"));
        }

        // Union with any pre-existing target declaration, duplicate-free and
        // order-preserving, so a repeated run leaves the set unchanged. The
        // target's own variation bit survives on the declaration but does
        // not enable the child pass below: only a merged source axis can
        // have left child entries keyed to a source category.
        let mut target_variation = variation_axis;
        if let Some(existing) = attributes.get(target) {
            target_variation = target_variation || existing.is_variation;
            let mut merged = existing.options.clone();
            merged.extend(new_options);
            new_options = merged;
        }
        let mut seen: HashSet<TermId> = HashSet::new();
        new_options.retain(|id| seen.insert(*id));

        if !dry_run {
            attributes.insert(
                target.to_string(),
                DeclaredAttribute {
                    options: new_options,
                    is_variation: target_variation,
                },
            );
            self.store
                .update_item_attributes(item.id, &attributes)
                .await?;
        }

        let mut children_before = 0u32;
        let mut children_after = 0u32;
        let mut wildcard = false;

        if item.kind == ItemKind::Variable && variation_axis {
            let target_key = meta_key(target);
            for variant_id in self.store.children_of(item.id).await? {
                let Some(variant) = self.store.get_variant(variant_id).await? else {
                    continue;
                };

                let mut moves: Vec<EntryMove> = Vec::new();
                for source in &found_sources {
                    let source_key = meta_key(source);
                    let Some(old_slug) = variant.entries.get(&source_key) else {
                        continue;
                    };
                    children_before += 1;

                    let new_slug = match slug_map.get(&(source.clone(), old_slug.clone())) {
                        Some(slug) => Some(slug.clone()),
                        None => {
                            self.resolver
                                .translate_slug(old_slug, source, target, dry_run)
                                .await?
                        }
                    };
                    match new_slug {
                        Some(slug) if !dry_run => moves.push(EntryMove {
                            old_key: source_key,
                            new_key: target_key.clone(),
                            new_value: slug,
                        }),
                        Some(_) => {}
                        None => {
                            debug!(variant = variant_id, slug = %old_slug, "no target translation for child slug");
                        }
                    }
                }

                if dry_run {
                    children_after = children_before;
                    continue;
                }
                if !moves.is_empty() {
                    self.rewriter.apply(&variant, &moves).await?;
                }
                // Re-read so the count reflects what was actually persisted.
                let refreshed = self.store.get_variant(variant_id).await?;
                match refreshed.and_then(|v| v.entries.get(&target_key).cloned()) {
                    Some(value) if !value.is_empty() => children_after += 1,
                    _ => wildcard = true,
                }
            }
        }

        let action = if dry_run { "DRY" } else { "LIVE" };
        let detail = format!("Sources: {}", found_sources.join(","));
        let entry = AuditEntry::new("MERGE", Some(item.id), action, detail.clone())
            .with_counts(children_before, children_after, wildcard);
        let log_line = self.audit.append(&entry)?;

        Ok(ItemOutcome {
            item_id: item.id,
            action: action.to_string(),
            state_changing: true,
            before: children_before,
            after: children_after,
            wildcard,
            detail,
            log_line,
        })
    }
}
