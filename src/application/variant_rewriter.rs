//! Variant attribute rewriting.
//!
//! Applies a set of key/value moves to one child record. Children are not
//! required to expose every parent category, so moves whose old key is
//! absent are silently skipped; moves that would write the value already
//! present are skipped too, so an already-fixed child costs zero writes.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::domain::entities::Variant;
use crate::domain::store::CatalogStore;

/// One entry rewrite: drop `old_key`, set `new_key` to `new_value`.
/// `old_key == new_key` expresses an in-place value fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMove {
    pub old_key: String,
    pub new_key: String,
    pub new_value: String,
}

pub struct VariantRewriter {
    store: Arc<dyn CatalogStore>,
}

impl VariantRewriter {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Apply the moves to one variant. Returns whether anything was written.
    pub async fn apply(&self, variant: &Variant, moves: &[EntryMove]) -> Result<bool> {
        let mut changed = false;
        for mv in moves {
            let Some(current) = variant.entries.get(&mv.old_key) else {
                continue;
            };
            if mv.old_key == mv.new_key && current == &mv.new_value {
                continue;
            }
            self.store
                .set_variant_entry(variant.id, &mv.new_key, &mv.new_value)
                .await?;
            if mv.old_key != mv.new_key {
                self.store
                    .delete_variant_entry(variant.id, &mv.old_key)
                    .await?;
            }
            debug!(
                variant = variant.id,
                old_key = %mv.old_key,
                new_key = %mv.new_key,
                "rewrote child attribute entry"
            );
            changed = true;
        }
        Ok(changed)
    }
}
