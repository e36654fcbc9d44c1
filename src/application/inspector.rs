//! Item inspector: structured, non-mutating diagnostic report.
//!
//! Gives an operator the raw truth about one item before and after a
//! repair: declared categories with axis flags and resolved term names,
//! plus each child's meta entries and wildcard classification. Pure read;
//! consumed interactively by an external UI.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::entities::{ItemId, ItemKind, TermId, VariantId};
use crate::domain::slug::ATTR_META_PREFIX;
use crate::domain::store::CatalogStore;

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub item_id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    pub attributes: Vec<AttributeReport>,
    pub children: Vec<VariantReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributeReport {
    pub category: String,
    pub is_variation: bool,
    pub term_ids: Vec<TermId>,
    /// "Name (slug: x)" per id, or an unknown-id marker for dead ids.
    pub resolved: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    /// Every attribute entry carries a non-empty value.
    Defined,
    /// At least one entry is empty: the Any wildcard state.
    AnyWildcard,
    /// The child has no attribute entries at all.
    NoAttributes,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantReport {
    pub variant_id: VariantId,
    pub status: VariantStatus,
    pub entries: BTreeMap<String, String>,
}

pub struct Inspector {
    store: Arc<dyn CatalogStore>,
}

impl Inspector {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Build the report for one item; `Ok(None)` when the id is unknown.
    pub async fn inspect(&self, item_id: ItemId) -> Result<Option<ItemReport>> {
        let Some(item) = self.store.get_item(item_id).await? else {
            return Ok(None);
        };

        let mut attributes = Vec::new();
        for (category, attr) in &item.attributes {
            let mut resolved = Vec::new();
            for term_id in &attr.options {
                match self.store.get_term(*term_id).await? {
                    Some(t) => resolved.push(format!("{} (slug: {})", t.name, t.slug)),
                    None => resolved.push(format!("Unknown ID {term_id}")),
                }
            }
            attributes.push(AttributeReport {
                category: category.clone(),
                is_variation: attr.is_variation,
                term_ids: attr.options.clone(),
                resolved,
            });
        }

        let mut children = Vec::new();
        if item.kind == ItemKind::Variable {
            for variant_id in self.store.children_of(item_id).await? {
                let Some(variant) = self.store.get_variant(variant_id).await? else {
                    continue;
                };
                let entries: BTreeMap<String, String> = variant
                    .entries
                    .iter()
                    .filter(|(k, _)| k.starts_with(ATTR_META_PREFIX))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let status = if entries.is_empty() {
                    VariantStatus::NoAttributes
                } else if entries.values().any(String::is_empty) {
                    VariantStatus::AnyWildcard
                } else {
                    VariantStatus::Defined
                };
                children.push(VariantReport {
                    variant_id,
                    status,
                    entries,
                });
            }
        }

        Ok(Some(ItemReport {
            item_id,
            name: item.name,
            kind: item.kind,
            attributes,
            children,
        }))
    }
}
