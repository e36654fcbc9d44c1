//! Category rescue: numeric placeholder names/slugs, and term merging.
//!
//! A numeric term name is a stale internal identifier that got stored as a
//! display name. The rescue pass dereferences the identifier; when it names
//! a term of a different record type the term is conservatively skipped,
//! otherwise the true name either merges the term into an existing one or
//! renames it in place. Numeric slugs are regenerated independently.
//! Works directly over one category's terms; never touches item pages.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::dto::{RescueAction, RescueOutcome};
use crate::domain::audit::{AuditEntry, AuditSink};
use crate::domain::entities::{Term, TermId};
use crate::domain::slug::{is_attribute_taxonomy, is_numeric, meta_key, sanitize_slug};
use crate::domain::store::CatalogStore;

pub struct RescueOperation {
    store: Arc<dyn CatalogStore>,
    audit: Arc<dyn AuditSink>,
}

impl RescueOperation {
    pub fn new(store: Arc<dyn CatalogStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Rescue every term of one category. Each term is handled
    /// independently; total work is O(terms), not O(items). A term that
    /// fails (dereference, rename collision, any store error) is logged and
    /// skipped so the rest of the category still gets fixed. In dry-run
    /// mode the same decisions are made and audited, with no store mutation.
    #[instrument(skip(self))]
    pub async fn run_category(&self, category: &str, dry_run: bool) -> Result<Vec<RescueOutcome>> {
        let terms = self.store.terms_of(category).await?;
        if terms.is_empty() {
            info!(category, "no terms found; nothing to rescue");
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::new();
        for term in terms {
            match self.rescue_term(term.clone(), category, dry_run).await {
                Ok(mut term_outcomes) => outcomes.append(&mut term_outcomes),
                Err(e) => {
                    warn!(term = term.id, name = %term.name, error = %e, "rescue failed for term; continuing");
                }
            }
        }
        Ok(outcomes)
    }

    /// Handle one term: the numeric-name pass, then the independent
    /// numeric-slug pass. Yields zero, one or two outcomes.
    async fn rescue_term(
        &self,
        mut term: Term,
        category: &str,
        dry_run: bool,
    ) -> Result<Vec<RescueOutcome>> {
        let mut outcomes = Vec::new();

        if is_numeric(&term.name) {
            // A name too long to be an id cannot dereference to anything;
            // treated the same as an id that resolves to no record.
            let original = match term.name.parse::<TermId>() {
                Ok(id) => self.store.get_term(id).await?,
                Err(_) => None,
            };

            if let Some(original) = original {
                if !is_attribute_taxonomy(&original.taxonomy) {
                    let detail =
                        format!("ID {} belongs to '{}', not an attribute", term.name, original.taxonomy);
                    outcomes.push(self.record(
                        term.id,
                        RescueAction::Skipped,
                        "SKIP",
                        detail,
                        dry_run,
                    )?);
                    return Ok(outcomes);
                }

                let true_name = original.name.clone();
                if let Some(correct) =
                    self.store.find_term_by_name(category, &true_name).await?
                {
                    // The true-named term already exists: fold the numeric
                    // one into it and drop it.
                    if !dry_run {
                        self.merge_terms(&term, &correct, category).await?;
                    }
                    let detail = format!("ID {} -> {}", term.name, correct.name);
                    outcomes.push(self.record(
                        term.id,
                        RescueAction::Merged,
                        "MERGE",
                        detail,
                        dry_run,
                    )?);
                    return Ok(outcomes);
                }

                let new_slug = sanitize_slug(&true_name);
                if !dry_run {
                    self.store
                        .update_term(category, term.id, Some(&true_name), Some(&new_slug))
                        .await?;
                }
                let detail = format!("{} -> {}", term.name, true_name);
                outcomes.push(self.record(
                    term.id,
                    RescueAction::Renamed,
                    "RENAME",
                    detail,
                    dry_run,
                )?);
                term.name = true_name;
                term.slug = new_slug;
            } else {
                warn!(name = %term.name, "numeric term name dereferences to nothing; left alone");
            }
        }

        // Independent slug pass: a numeric slug is regenerated from the
        // (possibly just-fixed) name, but only when the result is itself
        // non-numeric and actually different.
        if is_numeric(&term.slug) {
            let new_slug = sanitize_slug(&term.name);
            if !is_numeric(&new_slug) && new_slug != term.slug {
                if !dry_run {
                    self.store
                        .update_term(category, term.id, None, Some(&new_slug))
                        .await?;
                }
                let detail = format!("{} -> {}", term.slug, new_slug);
                outcomes.push(self.record(
                    term.id,
                    RescueAction::SlugFixed,
                    "FIX SLUG",
                    detail,
                    dry_run,
                )?);
            }
        }
        Ok(outcomes)
    }

    fn record(
        &self,
        term_id: TermId,
        action: RescueAction,
        label: &str,
        mut detail: String,
        dry_run: bool,
    ) -> Result<RescueOutcome> {
        if dry_run {
            detail.push_str(" [DRY]");
        }
        let log_line = self
            .audit
            .append(&AuditEntry::new("RESCUE", None, label, detail.clone()))?;
        Ok(RescueOutcome {
            term_id,
            action,
            detail,
            log_line,
        })
    }

    /// Merge `bad` into `good` within one category, fixing references:
    /// items carrying bad are additively tagged with good, child entries
    /// referencing bad's slug are bulk-rewritten to good's, and bad is
    /// deleted last so a failure before the delete loses no data.
    pub async fn merge_terms(&self, bad: &Term, good: &Term, category: &str) -> Result<()> {
        for item_id in self.store.items_with_term(category, bad.id).await? {
            self.store
                .append_item_term(item_id, category, good.id)
                .await?;
        }
        let rewritten = self
            .store
            .bulk_rewrite_variant_entries(&meta_key(category), &bad.slug, &good.slug)
            .await?;
        info!(
            category,
            bad = %bad.slug,
            good = %good.slug,
            rewritten,
            "bulk-rewrote child references"
        );
        self.store.delete_term(category, bad.id).await?;
        Ok(())
    }

    /// Operator-requested merge of two terms of one category, audited as a
    /// MANUAL action. Returns the screen line for display.
    pub async fn manual_merge(
        &self,
        category: &str,
        from: TermId,
        to: TermId,
    ) -> Result<String> {
        anyhow::ensure!(from != to, "cannot merge a term into itself");
        let bad = self
            .store
            .get_term(from)
            .await?
            .with_context(|| format!("term {from} not found"))?
            .to_term();
        let good = self
            .store
            .get_term(to)
            .await?
            .with_context(|| format!("term {to} not found"))?
            .to_term();
        self.merge_terms(&bad, &good, category).await?;
        let detail = format!("{} -> {}", bad.name, good.name);
        self.audit
            .append(&AuditEntry::new("MANUAL", None, "MERGE", detail))
    }
}
