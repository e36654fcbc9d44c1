//! Domain entities
//!
//! Core records of the catalog attribute model: categories (taxonomies),
//! terms, items and their variant children. Items declare which categories
//! they use and which of those act as variation axes; children carry a weak
//! slug-string back-reference per axis. That weak reference is the drift the
//! reconciler exists to repair, so it is preserved as-is in the model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type TermId = u64;
pub type ItemId = u64;
pub type VariantId = u64;

/// One allowed value within a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub name: String,
    pub slug: String,
}

/// A term looked up by id alone, without assuming which taxonomy owns it.
/// The rescue operation dereferences numeric names this way and must be able
/// to see that the hit belongs to a foreign record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRef {
    pub id: TermId,
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
}

impl TermRef {
    pub fn to_term(&self) -> Term {
        Term {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Simple,
    Variable,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Variable => "variable",
        }
    }
}

/// One category declaration on an item: the selected term ids and whether
/// the category differentiates the item's children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredAttribute {
    pub options: Vec<TermId>,
    pub is_variation: bool,
}

/// A catalog item. Only the attribute mapping is ever mutated by the
/// reconciler; identity and kind are read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    /// Category key (e.g. `pa_color`) -> declaration.
    pub attributes: BTreeMap<String, DeclaredAttribute>,
}

impl CatalogItem {
    /// Category keys currently flagged as variation axes.
    pub fn variation_axes(&self) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.is_variation)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// A variant child. Entries are the raw meta mapping, keys in
/// `attribute_<category>` form, values term slugs ("" = the Any wildcard).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub parent_id: ItemId,
    pub entries: BTreeMap<String, String>,
}

/// One page of items pulled from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<CatalogItem>,
    pub total_count: u64,
    pub total_pages: u32,
}
