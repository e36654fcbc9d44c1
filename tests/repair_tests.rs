//! Repair operation: orphan re-keying, ghost value fixing, wildcard
//! detection, dry-run and idempotence.

use std::sync::Arc;

use attr_reconciler::application::repair::RepairOperation;
use attr_reconciler::domain::audit::AuditSink;
use attr_reconciler::domain::entities::{ItemId, ItemKind};
use attr_reconciler::domain::store::CatalogStore;
use attr_reconciler::infrastructure::{MemoryAuditLog, MemoryCatalogStore};

fn operation(store: &Arc<MemoryCatalogStore>) -> (RepairOperation, Arc<MemoryAuditLog>) {
    let audit = Arc::new(MemoryAuditLog::new());
    let op = RepairOperation::new(
        Arc::clone(store) as Arc<dyn CatalogStore>,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
    );
    (op, audit)
}

/// Variable item with one color axis carrying the given terms.
async fn seed_variable(store: &MemoryCatalogStore, terms: &[(&str, &str)]) -> ItemId {
    let mut ids = Vec::new();
    for (name, slug) in terms {
        ids.push(store.seed_term("pa_color", name, slug).await.id);
    }
    let item = store.seed_item("Shirt", ItemKind::Variable).await;
    store.declare_attribute(item, "pa_color", ids, true).await;
    item
}

#[tokio::test]
async fn orphan_entry_is_rekeyed_by_exact_slug_match() {
    let store = Arc::new(MemoryCatalogStore::new());
    let item = seed_variable(&store, &[("Blue", "blue")]).await;
    // Entry keyed to a category that is not a variation axis of the parent,
    // but whose value names a term of the real axis.
    let child = store
        .seed_variant(item, &[("attribute_pa_material", "blue")])
        .await;

    let (op, audit) = operation(&store);
    let outcome = op.run_by_id(item, false).await.unwrap();

    assert!(outcome.state_changing);
    assert_eq!(outcome.action, "FIX ORPHANS/GHOSTS");
    assert_eq!(outcome.before, 1);
    assert_eq!(outcome.after, 1);
    assert!(!outcome.wildcard);
    assert!(outcome.detail.contains("Fixed blue (Exact)"));
    assert_eq!(audit.len(), 1);

    let variant = store.get_variant(child).await.unwrap().unwrap();
    assert_eq!(variant.entries.get("attribute_pa_color").unwrap(), "blue");
    assert!(!variant.entries.contains_key("attribute_pa_material"));
}

#[tokio::test]
async fn orphan_entry_falls_back_to_fuzzy_name_match() {
    let store = Arc::new(MemoryCatalogStore::new());
    let item = seed_variable(&store, &[("Navy Blue", "navy-blue")]).await;
    // Value neither names nor slugs any current term exactly, but
    // normalizes to an axis term; fuzzy match must map it to the real slug.
    let child = store
        .seed_variant(item, &[("attribute_pa_shade", "Navy blue")])
        .await;

    let (op, _audit) = operation(&store);
    let outcome = op.run_by_id(item, false).await.unwrap();

    assert!(outcome.detail.contains("Fixed Navy blue (Fuzzy)"));
    let variant = store.get_variant(child).await.unwrap().unwrap();
    assert_eq!(
        variant.entries.get("attribute_pa_color").unwrap(),
        "navy-blue"
    );
}

#[tokio::test]
async fn ghost_value_is_fixed_by_fuzzy_match_within_category() {
    let store = Arc::new(MemoryCatalogStore::new());
    let item = seed_variable(&store, &[("Navy Blue", "navy-blue")]).await;
    // Right key, dead slug: "navy blue" is no current term's name or slug
    // but normalizes to an axis term.
    let child = store
        .seed_variant(item, &[("attribute_pa_color", "navy blue")])
        .await;

    let (op, _audit) = operation(&store);
    let outcome = op.run_by_id(item, false).await.unwrap();

    assert_eq!(outcome.before, 1);
    assert_eq!(outcome.after, 1);
    assert!(outcome.detail.contains("Fixed Ghost navy blue -> navy-blue"));
    let variant = store.get_variant(child).await.unwrap().unwrap();
    assert_eq!(
        variant.entries.get("attribute_pa_color").unwrap(),
        "navy-blue"
    );
}

#[tokio::test]
async fn unmatched_defect_is_counted_but_left_alone() {
    let store = Arc::new(MemoryCatalogStore::new());
    let item = seed_variable(&store, &[("Blue", "blue")]).await;
    let child = store
        .seed_variant(item, &[
            ("attribute_pa_color", "blue"),
            ("attribute_pa_material", "vantablack"),
        ])
        .await;

    let (op, _audit) = operation(&store);
    let outcome = op.run_by_id(item, false).await.unwrap();

    // One defect found, zero children changed, entry untouched.
    assert_eq!(outcome.before, 1);
    assert_eq!(outcome.after, 0);
    let variant = store.get_variant(child).await.unwrap().unwrap();
    assert_eq!(
        variant.entries.get("attribute_pa_material").unwrap(),
        "vantablack"
    );
}

#[tokio::test]
async fn wildcard_only_child_is_reported_without_fixes() {
    let store = Arc::new(MemoryCatalogStore::new());
    let item = seed_variable(&store, &[("Blue", "blue")]).await;
    store.seed_variant(item, &[("attribute_pa_color", "")]).await;

    let (op, audit) = operation(&store);
    let outcome = op.run_by_id(item, false).await.unwrap();

    assert!(outcome.state_changing);
    assert!(outcome.wildcard);
    assert_eq!(outcome.before, 0);
    assert_eq!(audit.entries()[0].wildcard_label(), "YES");
}

#[tokio::test]
async fn second_run_finds_nothing_and_writes_nothing() {
    let store = Arc::new(MemoryCatalogStore::new());
    let item = seed_variable(&store, &[("Blue", "blue")]).await;
    store
        .seed_variant(item, &[("attribute_pa_material", "blue")])
        .await;

    let (op, audit) = operation(&store);
    op.run_by_id(item, false).await.unwrap();
    let writes = store.write_count().await;

    let second = op.run_by_id(item, false).await.unwrap();
    assert!(!second.state_changing);
    assert_eq!(second.detail, "no repairs needed");
    assert_eq!(store.write_count().await, writes);
    assert_eq!(audit.len(), 1);
}

#[tokio::test]
async fn dry_run_counts_like_live_but_writes_nothing() {
    let store = Arc::new(MemoryCatalogStore::new());
    let item = seed_variable(&store, &[("Blue", "blue")]).await;
    let child = store
        .seed_variant(item, &[("attribute_pa_material", "blue")])
        .await;
    let baseline = store.write_count().await;

    let (op, audit) = operation(&store);
    let dry = op.run_by_id(item, true).await.unwrap();

    assert_eq!(dry.before, 1);
    assert_eq!(dry.after, 1);
    assert!(dry.detail.ends_with(" [DRY]"));
    assert_eq!(store.write_count().await, baseline);
    assert_eq!(audit.len(), 1);

    let variant = store.get_variant(child).await.unwrap().unwrap();
    assert!(variant.entries.contains_key("attribute_pa_material"));
}

#[tokio::test]
async fn missing_and_simple_items_are_skips_not_errors() {
    let store = Arc::new(MemoryCatalogStore::new());
    let simple = store.seed_item("Mug", ItemKind::Simple).await;

    let (op, audit) = operation(&store);
    let missing = op.run_by_id(9999, false).await.unwrap();
    assert!(!missing.state_changing);
    assert_eq!(missing.detail, "item not found");

    let skipped = op.run_by_id(simple, false).await.unwrap();
    assert!(!skipped.state_changing);
    assert_eq!(skipped.detail, "not a variable item");
    assert!(audit.is_empty());
}
