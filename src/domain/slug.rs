//! Slug normalization and attribute key conventions.
//!
//! Children reference terms through meta entries keyed
//! `attribute_<taxonomy>` whose value is the term *slug*, not the term id.
//! Every comparison the reconciler performs eventually funnels through the
//! normalization rules in this module, so they live in one place.

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix carried by every child attribute meta key.
pub const ATTR_META_PREFIX: &str = "attribute_";

/// Prefix distinguishing attribute taxonomies from other record types.
pub const ATTR_TAXONOMY_PREFIX: &str = "pa_";

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Derive a normalized slug from a display name: lowercase, runs of
/// non-alphanumeric characters collapsed to a single dash, edges trimmed.
pub fn sanitize_slug(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// True when the string is a bare decimal number. Term names and slugs in
/// this form are the defect class the rescue operation repairs.
pub fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Meta key a child uses for one taxonomy, e.g. `attribute_pa_color`.
pub fn meta_key(category_key: &str) -> String {
    format!("{ATTR_META_PREFIX}{category_key}")
}

/// Inverse of [`meta_key`]: the taxonomy a child meta entry points at.
pub fn category_of_meta_key(key: &str) -> Option<&str> {
    key.strip_prefix(ATTR_META_PREFIX)
}

/// Whether a taxonomy key names a product attribute (as opposed to some
/// other record type the rescue dereference may land on).
pub fn is_attribute_taxonomy(taxonomy: &str) -> bool {
    taxonomy.starts_with(ATTR_TAXONOMY_PREFIX)
}
