//! Rescue operation: numeric name dereferencing (skip / merge / rename),
//! numeric slug regeneration, manual merges, dry-run.

use std::sync::Arc;

use attr_reconciler::application::dto::RescueAction;
use attr_reconciler::application::rescue::RescueOperation;
use attr_reconciler::domain::audit::AuditSink;
use attr_reconciler::domain::entities::ItemKind;
use attr_reconciler::domain::store::CatalogStore;
use attr_reconciler::infrastructure::{MemoryAuditLog, MemoryCatalogStore};

fn operation(store: &Arc<MemoryCatalogStore>) -> (RescueOperation, Arc<MemoryAuditLog>) {
    let audit = Arc::new(MemoryAuditLog::new());
    let op = RescueOperation::new(
        Arc::clone(store) as Arc<dyn CatalogStore>,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
    );
    (op, audit)
}

#[tokio::test]
async fn numeric_name_is_renamed_to_the_dereferenced_name() {
    let store = Arc::new(MemoryCatalogStore::new());
    // Id 500 names a term of another attribute category; its name is the
    // truth the numeric placeholder should carry.
    store.seed_term_with_id(500, "pa_size", "Large", "large").await;
    let broken = store.seed_term("pa_color", "500", "500").await;

    let (op, _audit) = operation(&store);
    let outcomes = op.run_category("pa_color", false).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].action, RescueAction::Renamed);
    assert_eq!(outcomes[0].detail, "500 -> Large");

    let fixed = store
        .find_term_by_name("pa_color", "Large")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fixed.id, broken.id);
    assert_eq!(fixed.slug, "large");
}

#[tokio::test]
async fn numeric_name_merges_into_existing_true_named_term() {
    let store = Arc::new(MemoryCatalogStore::new());
    let blue = store.seed_term_with_id(600, "pa_color", "Blue", "blue").await;
    let broken = store.seed_term("pa_color", "600", "600").await;

    let item = store.seed_item("Shirt", ItemKind::Variable).await;
    store
        .declare_attribute(item, "pa_color", vec![broken.id], true)
        .await;
    let child = store
        .seed_variant(item, &[("attribute_pa_color", "600")])
        .await;

    let (op, _audit) = operation(&store);
    let outcomes = op.run_category("pa_color", false).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].action, RescueAction::Merged);
    assert_eq!(outcomes[0].detail, "ID 600 -> Blue");

    // Item additively retagged, child reference rewritten, bad term gone.
    let updated = store.get_item(item).await.unwrap().unwrap();
    assert!(updated
        .attributes
        .get("pa_color")
        .unwrap()
        .options
        .contains(&blue.id));
    let variant = store.get_variant(child).await.unwrap().unwrap();
    assert_eq!(variant.entries.get("attribute_pa_color").unwrap(), "blue");
    let remaining = store.terms_of("pa_color").await.unwrap();
    assert!(remaining.iter().all(|t| t.id != broken.id));
}

#[tokio::test]
async fn numeric_name_of_foreign_record_type_is_skipped() {
    let store = Arc::new(MemoryCatalogStore::new());
    store.seed_term_with_id(900, "category", "Shoes", "shoes").await;
    store.seed_term("pa_color", "900", "900").await;

    let (op, audit) = operation(&store);
    let outcomes = op.run_category("pa_color", false).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].action, RescueAction::Skipped);
    assert!(outcomes[0].detail.contains("belongs to 'category'"));
    assert_eq!(audit.len(), 1, "skips are audited");

    let untouched = store.terms_of("pa_color").await.unwrap();
    assert_eq!(untouched[0].name, "900");
}

#[tokio::test]
async fn numeric_slug_is_regenerated_from_the_name() {
    let store = Arc::new(MemoryCatalogStore::new());
    store.seed_term("pa_color", "Green", "123").await;

    let (op, _audit) = operation(&store);
    let outcomes = op.run_category("pa_color", false).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].action, RescueAction::SlugFixed);
    assert_eq!(outcomes[0].detail, "123 -> green");
    let fixed = store
        .find_term_by_slug("pa_color", "green")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fixed.name, "Green");
}

#[tokio::test]
async fn rename_then_slug_fix_happen_in_one_pass() {
    let store = Arc::new(MemoryCatalogStore::new());
    store.seed_term_with_id(500, "pa_size", "Large", "large").await;
    // Name and slug both numeric; the rename fixes the slug too, so the
    // independent slug pass has nothing left to do.
    store.seed_term("pa_color", "500", "500").await;

    let (op, _audit) = operation(&store);
    let outcomes = op.run_category("pa_color", false).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].action, RescueAction::Renamed);
}

#[tokio::test]
async fn dry_run_audits_decisions_without_mutating() {
    let store = Arc::new(MemoryCatalogStore::new());
    store.seed_term_with_id(500, "pa_size", "Large", "large").await;
    store.seed_term("pa_color", "500", "500").await;
    let baseline = store.write_count().await;

    let (op, audit) = operation(&store);
    let outcomes = op.run_category("pa_color", true).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].action, RescueAction::Renamed);
    assert!(outcomes[0].detail.ends_with(" [DRY]"));
    assert_eq!(audit.len(), 1);
    assert_eq!(store.write_count().await, baseline);

    let untouched = store.terms_of("pa_color").await.unwrap();
    assert_eq!(untouched[0].name, "500");
}

#[tokio::test]
async fn oversized_numeric_name_does_not_abort_the_category() {
    let store = Arc::new(MemoryCatalogStore::new());
    // All digits but far beyond any possible id: dereferences to nothing
    // and must not stop later terms from being fixed.
    store
        .seed_term("pa_color", "99999999999999999999999999", "broken")
        .await;
    store.seed_term("pa_color", "Green", "123").await;

    let (op, _audit) = operation(&store);
    let outcomes = op.run_category("pa_color", false).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].action, RescueAction::SlugFixed);
    let untouched = store.terms_of("pa_color").await.unwrap();
    assert_eq!(untouched[0].name, "99999999999999999999999999");
}

#[tokio::test]
async fn rename_collision_skips_the_term_and_continues() {
    let store = Arc::new(MemoryCatalogStore::new());
    store.seed_term_with_id(500, "pa_size", "Large", "large").await;
    // Slug "large" is already taken by a differently-named term, so the
    // rename of the numeric term collides; the category pass must still
    // reach the healthy term after it.
    store.seed_term("pa_color", "Lärge", "large").await;
    store.seed_term("pa_color", "500", "500").await;
    store.seed_term("pa_color", "Green", "123").await;

    let (op, _audit) = operation(&store);
    let outcomes = op.run_category("pa_color", false).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].action, RescueAction::SlugFixed);
    assert_eq!(outcomes[0].detail, "123 -> green");

    // The colliding term is left as it was.
    let numeric = store
        .find_term_by_name("pa_color", "500")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(numeric.slug, "500");
}

#[tokio::test]
async fn healthy_terms_produce_no_outcomes() {
    let store = Arc::new(MemoryCatalogStore::new());
    store.seed_term("pa_color", "Blue", "blue").await;
    store.seed_term("pa_color", "Red", "red").await;

    let (op, audit) = operation(&store);
    let outcomes = op.run_category("pa_color", false).await.unwrap();

    assert!(outcomes.is_empty());
    assert!(audit.is_empty());
}

#[tokio::test]
async fn manual_merge_folds_one_term_into_another() {
    let store = Arc::new(MemoryCatalogStore::new());
    let navy = store.seed_term("pa_color", "Navy", "navy").await;
    let blue = store.seed_term("pa_color", "Blue", "blue").await;
    let item = store.seed_item("Shirt", ItemKind::Variable).await;
    store
        .declare_attribute(item, "pa_color", vec![navy.id], true)
        .await;
    let child = store
        .seed_variant(item, &[("attribute_pa_color", "navy")])
        .await;

    let (op, audit) = operation(&store);
    let line = op.manual_merge("pa_color", navy.id, blue.id).await.unwrap();

    assert!(line.contains("MANUAL"));
    assert!(line.contains("Navy -> Blue"));
    assert_eq!(audit.len(), 1);

    let variant = store.get_variant(child).await.unwrap().unwrap();
    assert_eq!(variant.entries.get("attribute_pa_color").unwrap(), "blue");
    let remaining = store.terms_of("pa_color").await.unwrap();
    assert!(remaining.iter().all(|t| t.id != navy.id));

    // Merging a term into itself is rejected up front.
    assert!(op.manual_merge("pa_color", blue.id, blue.id).await.is_err());
}
