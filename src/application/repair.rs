//! Single-item orphan/ghost repair.
//!
//! Two defect classes on child attribute entries:
//! - orphan: keyed to a category the parent no longer declares as a
//!   variation axis; re-keyed by exact slug match against any axis, else by
//!   fuzzy name match against the axes' trusted terms.
//! - ghost: keyed correctly but the slug no longer names a current term;
//!   fixed by fuzzy match within that category only.
//! Unmatched defects stay as-is: counted, reported, never guessed at.
//!
//! Fixes are planned against an in-memory copy of the child first and only
//! then persisted, so a dry run walks the identical counting path with zero
//! store writes.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::application::dto::ItemOutcome;
use crate::domain::audit::{AuditEntry, AuditSink};
use crate::domain::entities::{CatalogItem, ItemId, ItemKind, Variant};
use crate::domain::matching::TrustedTerms;
use crate::domain::slug::{category_of_meta_key, meta_key};
use crate::domain::store::CatalogStore;

/// A planned fix for one child entry.
#[derive(Debug)]
enum PlannedFix {
    /// Re-key an orphan entry to an axis category, keeping or replacing
    /// the value.
    Rekey {
        old_key: String,
        new_key: String,
        value: String,
    },
    /// Overwrite a ghost entry's value in place.
    Overwrite { key: String, value: String },
}

pub struct RepairOperation {
    store: Arc<dyn CatalogStore>,
    audit: Arc<dyn AuditSink>,
}

impl RepairOperation {
    pub fn new(store: Arc<dyn CatalogStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Repair one item by id. Missing or non-variable items are reported as
    /// skips, never as errors, so batch pages keep moving.
    pub async fn run_by_id(&self, item_id: ItemId, dry_run: bool) -> Result<ItemOutcome> {
        match self.store.get_item(item_id).await? {
            Some(item) if item.kind == ItemKind::Variable => self.run_item(&item, dry_run).await,
            Some(_) => Ok(ItemOutcome::noop(item_id, "not a variable item")),
            None => Ok(ItemOutcome::noop(item_id, "item not found")),
        }
    }

    /// Repair every child of one variable item. Idempotent: a second run
    /// over an already-fixed item finds zero defects and writes nothing.
    #[instrument(skip(self, item), fields(item = item.id, dry_run))]
    pub async fn run_item(&self, item: &CatalogItem, dry_run: bool) -> Result<ItemOutcome> {
        let axes = item.variation_axes();
        let mut trusted: HashMap<String, TrustedTerms> = HashMap::new();
        for axis in &axes {
            let mut terms = TrustedTerms::new();
            if let Some(attr) = item.attributes.get(axis) {
                for term_id in &attr.options {
                    if let Some(term_ref) = self.store.get_term(*term_id).await? {
                        terms.push(&term_ref.name, &term_ref.slug);
                    }
                }
            }
            trusted.insert(axis.clone(), terms);
        }

        let children = self.store.children_of(item.id).await?;
        if children.is_empty() {
            return Ok(ItemOutcome::noop(item.id, "no variations found"));
        }

        let mut defects_found = 0u32;
        let mut children_changed = 0u32;
        let mut wildcard = false;
        let mut details = String::new();

        for variant_id in children {
            let Some(variant) = self.store.get_variant(variant_id).await? else {
                continue;
            };

            let (fixes, defects) = self
                .plan_fixes(&variant, &axes, &trusted, &mut details)
                .await?;
            defects_found += defects;

            // Apply to a local copy first; a dry run stops there.
            let mut entries = variant.entries.clone();
            for fix in &fixes {
                match fix {
                    PlannedFix::Rekey {
                        old_key,
                        new_key,
                        value,
                    } => {
                        entries.remove(old_key);
                        entries.insert(new_key.clone(), value.clone());
                    }
                    PlannedFix::Overwrite { key, value } => {
                        entries.insert(key.clone(), value.clone());
                    }
                }
            }
            if !dry_run {
                for fix in &fixes {
                    match fix {
                        PlannedFix::Rekey {
                            old_key,
                            new_key,
                            value,
                        } => {
                            self.store
                                .set_variant_entry(variant_id, new_key, value)
                                .await?;
                            self.store.delete_variant_entry(variant_id, old_key).await?;
                        }
                        PlannedFix::Overwrite { key, value } => {
                            self.store.set_variant_entry(variant_id, key, value).await?;
                        }
                    }
                }
            }

            // Wildcard recompute against the post-fix state: any axis the
            // child has no non-empty value for leaves it in the Any state.
            for axis in &axes {
                match entries.get(&meta_key(axis)) {
                    Some(v) if !v.is_empty() => {}
                    _ => wildcard = true,
                }
            }

            if !fixes.is_empty() {
                children_changed += 1;
            }
        }

        if defects_found == 0 && !wildcard {
            return Ok(ItemOutcome::noop(item.id, "no repairs needed"));
        }

        let mut detail = if details.is_empty() {
            "No repairs possible".to_string()
        } else {
            details.trim_end().to_string()
        };
        if dry_run {
            detail.push_str(" [DRY]");
        }
        let entry = AuditEntry::new("REPAIR", Some(item.id), "FIX ORPHANS/GHOSTS", detail.clone())
            .with_counts(defects_found, children_changed, wildcard);
        let log_line = self.audit.append(&entry)?;

        Ok(ItemOutcome {
            item_id: item.id,
            action: "FIX ORPHANS/GHOSTS".to_string(),
            state_changing: true,
            before: defects_found,
            after: children_changed,
            wildcard,
            detail,
            log_line,
        })
    }

    /// Classify each attribute entry of one child and plan its fix.
    async fn plan_fixes(
        &self,
        variant: &Variant,
        axes: &[String],
        trusted: &HashMap<String, TrustedTerms>,
        details: &mut String,
    ) -> Result<(Vec<PlannedFix>, u32)> {
        let mut fixes = Vec::new();
        let mut defects = 0u32;

        for (key, value) in &variant.entries {
            let Some(category) = category_of_meta_key(key) else {
                continue;
            };

            if !axes.iter().any(|a| a == category) {
                // Orphan: entry keyed to a non-axis category.
                defects += 1;
                'fix: for axis in axes {
                    if self.store.term_exists(axis, value).await? {
                        fixes.push(PlannedFix::Rekey {
                            old_key: key.clone(),
                            new_key: meta_key(axis),
                            value: value.clone(),
                        });
                        details.push_str(&format!("Fixed {value} (Exact); "));
                        break 'fix;
                    }
                    if let Some(slug) = trusted
                        .get(axis)
                        .and_then(|t| t.fuzzy_slug(value))
                        .map(str::to_string)
                    {
                        fixes.push(PlannedFix::Rekey {
                            old_key: key.clone(),
                            new_key: meta_key(axis),
                            value: slug,
                        });
                        details.push_str(&format!("Fixed {value} (Fuzzy); "));
                        break 'fix;
                    }
                }
            } else if !value.is_empty() && !self.store.term_exists(category, value).await? {
                // Ghost: right category, dead slug. Empty values are the
                // wildcard state and handled by the recompute afterwards.
                defects += 1;
                if let Some(slug) = trusted
                    .get(category)
                    .and_then(|t| t.fuzzy_slug(value))
                    .map(str::to_string)
                {
                    details.push_str(&format!("Fixed Ghost {value} -> {slug}; "));
                    fixes.push(PlannedFix::Overwrite {
                        key: key.clone(),
                        value: slug,
                    });
                } else {
                    debug!(variant = variant.id, value = %value, "ghost entry with no fuzzy candidate");
                }
            }
        }
        Ok((fixes, defects))
    }
}
