//! Shared term matching strategy.
//!
//! Merge, repair and rescue all need to answer the same question: does this
//! candidate string (a legacy slug, a dead slug, or a foreign name) denote
//! one of the terms currently declared on an axis? The answer is computed
//! the same way everywhere: exact string equality against the trusted name,
//! or equality of the normalized-slug forms. Keeping the rule in one place
//! stops the three operations from drifting apart.

use crate::domain::slug::sanitize_slug;

/// The currently declared terms of one category, indexed for matching.
/// Built from an item's parent declarations, hence "trusted": these are the
/// names and slugs the child entries are supposed to point at.
#[derive(Debug, Clone, Default)]
pub struct TrustedTerms {
    entries: Vec<TrustedEntry>,
}

#[derive(Debug, Clone)]
struct TrustedEntry {
    name: String,
    slug: String,
    normalized_name: String,
}

impl TrustedTerms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, slug: &str) {
        self.entries.push(TrustedEntry {
            name: name.to_string(),
            slug: slug.to_string(),
            normalized_name: sanitize_slug(name),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fuzzy match: accept the candidate when its normalized-slug form
    /// equals the trusted name's normalized form, or when the raw strings
    /// are equal. Covers both legacy-slug-as-name and true-name equality.
    /// Returns the trusted slug the caller should write.
    pub fn fuzzy_slug(&self, candidate: &str) -> Option<&str> {
        if candidate.is_empty() {
            return None;
        }
        let normalized = sanitize_slug(candidate);
        self.entries
            .iter()
            .find(|e| normalized == e.normalized_name || candidate == e.name)
            .map(|e| e.slug.as_str())
    }

    /// Exact slug membership, used to confirm a value already points at a
    /// currently declared term.
    pub fn contains_slug(&self, slug: &str) -> bool {
        self.entries.iter().any(|e| e.slug == slug)
    }
}
