//! SQLite-backed catalog store.
//!
//! Adapter over a SQLite database using sqlx. The schema mirrors the weak
//! data model the reconciler operates on: term ids are rowids, item
//! declarations hold term ids as a JSON array, and variant entries reference
//! terms by slug string only.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::entities::{
    CatalogItem, DeclaredAttribute, ItemId, ItemKind, ItemPage, Term, TermId, TermRef, Variant,
    VariantId,
};
use crate::domain::store::{CatalogStore, StoreError, StoreResult};

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS terms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        taxonomy TEXT NOT NULL,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        UNIQUE (taxonomy, slug)
    );
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('simple', 'variable'))
    );
    CREATE TABLE IF NOT EXISTS item_attributes (
        item_id INTEGER NOT NULL REFERENCES items (id) ON DELETE CASCADE,
        category TEXT NOT NULL,
        term_ids TEXT NOT NULL,
        is_variation INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (item_id, category)
    );
    CREATE TABLE IF NOT EXISTS variants (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES items (id) ON DELETE CASCADE
    );
    CREATE TABLE IF NOT EXISTS variant_entries (
        variant_id INTEGER NOT NULL REFERENCES variants (id) ON DELETE CASCADE,
        meta_key TEXT NOT NULL,
        meta_value TEXT NOT NULL,
        PRIMARY KEY (variant_id, meta_key)
    );
";

pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    /// Open (creating if necessary) the database at `database_url` and
    /// bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if db_path != ":memory:" && !Path::new(db_path).exists() {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            std::fs::File::create(db_path).context("creating database file")?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connecting to sqlite database")?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn backend(e: sqlx::Error) -> StoreError {
        StoreError::Backend(anyhow!(e))
    }

    fn parse_kind(kind: &str) -> ItemKind {
        if kind == "variable" {
            ItemKind::Variable
        } else {
            ItemKind::Simple
        }
    }

    async fn load_attributes(
        &self,
        item_id: ItemId,
    ) -> StoreResult<BTreeMap<String, DeclaredAttribute>> {
        let rows = sqlx::query(
            "SELECT category, term_ids, is_variation FROM item_attributes WHERE item_id = ?",
        )
        .bind(item_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::backend)?;

        let mut attributes = BTreeMap::new();
        for row in rows {
            let category: String = row.get("category");
            let ids_json: String = row.get("term_ids");
            let options: Vec<TermId> =
                serde_json::from_str(&ids_json).map_err(|e| StoreError::Backend(anyhow!(e)))?;
            let is_variation: i64 = row.get("is_variation");
            attributes.insert(
                category,
                DeclaredAttribute {
                    options,
                    is_variation: is_variation != 0,
                },
            );
        }
        Ok(attributes)
    }

    fn kind_filter(kinds: &[ItemKind]) -> String {
        let quoted: Vec<String> = kinds
            .iter()
            .map(|k| format!("'{}'", k.as_str()))
            .collect();
        quoted.join(", ")
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn fetch_items_page(
        &self,
        kinds: &[ItemKind],
        page: u32,
        page_size: u32,
    ) -> StoreResult<ItemPage> {
        let filter = Self::kind_filter(kinds);
        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM items WHERE kind IN ({filter})"))
                .fetch_one(&self.pool)
                .await
                .map_err(Self::backend)?;

        let page_size = page_size.max(1);
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let rows = sqlx::query(&format!(
            "SELECT id, name, kind FROM items WHERE kind IN ({filter}) ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::backend)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let kind: String = row.get("kind");
            items.push(CatalogItem {
                id: id as ItemId,
                name: row.get("name"),
                kind: Self::parse_kind(&kind),
                attributes: self.load_attributes(id as ItemId).await?,
            });
        }

        Ok(ItemPage {
            items,
            total_count: total_count as u64,
            total_pages: (total_count as u32).div_ceil(page_size),
        })
    }

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<CatalogItem>> {
        let row = sqlx::query("SELECT id, name, kind FROM items WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::backend)?;
        let Some(row) = row else { return Ok(None) };
        let kind: String = row.get("kind");
        Ok(Some(CatalogItem {
            id,
            name: row.get("name"),
            kind: Self::parse_kind(&kind),
            attributes: self.load_attributes(id).await?,
        }))
    }

    async fn update_item_attributes(
        &self,
        id: ItemId,
        attributes: &BTreeMap<String, DeclaredAttribute>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(Self::backend)?;
        sqlx::query("DELETE FROM item_attributes WHERE item_id = ?")
            .bind(id as i64)
            .execute(&mut *tx)
            .await
            .map_err(Self::backend)?;
        for (category, attr) in attributes {
            let ids_json =
                serde_json::to_string(&attr.options).map_err(|e| StoreError::Backend(anyhow!(e)))?;
            sqlx::query(
                "INSERT INTO item_attributes (item_id, category, term_ids, is_variation) VALUES (?, ?, ?, ?)",
            )
            .bind(id as i64)
            .bind(category)
            .bind(ids_json)
            .bind(i64::from(attr.is_variation))
            .execute(&mut *tx)
            .await
            .map_err(Self::backend)?;
        }
        tx.commit().await.map_err(Self::backend)?;
        Ok(())
    }

    async fn items_with_term(&self, category: &str, term: TermId) -> StoreResult<Vec<ItemId>> {
        // term_ids is a JSON array; membership is decided in Rust rather
        // than with string matching against the serialized form.
        let rows = sqlx::query("SELECT item_id, term_ids FROM item_attributes WHERE category = ?")
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::backend)?;
        let mut items = Vec::new();
        for row in rows {
            let ids_json: String = row.get("term_ids");
            let options: Vec<TermId> =
                serde_json::from_str(&ids_json).map_err(|e| StoreError::Backend(anyhow!(e)))?;
            if options.contains(&term) {
                let item_id: i64 = row.get("item_id");
                items.push(item_id as ItemId);
            }
        }
        Ok(items)
    }

    async fn append_item_term(
        &self,
        item: ItemId,
        category: &str,
        term: TermId,
    ) -> StoreResult<()> {
        let mut attributes = self.load_attributes(item).await?;
        let attr = attributes
            .entry(category.to_string())
            .or_insert_with(|| DeclaredAttribute {
                options: Vec::new(),
                is_variation: false,
            });
        if !attr.options.contains(&term) {
            attr.options.push(term);
        }
        self.update_item_attributes(item, &attributes).await
    }

    async fn children_of(&self, item: ItemId) -> StoreResult<Vec<VariantId>> {
        let rows = sqlx::query("SELECT id FROM variants WHERE item_id = ? ORDER BY id")
            .bind(item as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::backend)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                id as VariantId
            })
            .collect())
    }

    async fn get_variant(&self, id: VariantId) -> StoreResult<Option<Variant>> {
        let row = sqlx::query("SELECT item_id FROM variants WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::backend)?;
        let Some(row) = row else { return Ok(None) };
        let parent_id: i64 = row.get("item_id");

        let entry_rows =
            sqlx::query("SELECT meta_key, meta_value FROM variant_entries WHERE variant_id = ?")
                .bind(id as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(Self::backend)?;
        let entries = entry_rows
            .into_iter()
            .map(|row| (row.get("meta_key"), row.get("meta_value")))
            .collect();

        Ok(Some(Variant {
            id,
            parent_id: parent_id as ItemId,
            entries,
        }))
    }

    async fn set_variant_entry(&self, id: VariantId, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO variant_entries (variant_id, meta_key, meta_value) VALUES (?, ?, ?)
             ON CONFLICT (variant_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
        )
        .bind(id as i64)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(())
    }

    async fn delete_variant_entry(&self, id: VariantId, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM variant_entries WHERE variant_id = ? AND meta_key = ?")
            .bind(id as i64)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(Self::backend)?;
        Ok(())
    }

    async fn bulk_rewrite_variant_entries(
        &self,
        key: &str,
        old_value: &str,
        new_value: &str,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE variant_entries SET meta_value = ? WHERE meta_key = ? AND meta_value = ?",
        )
        .bind(new_value)
        .bind(key)
        .bind(old_value)
        .execute(&self.pool)
        .await
        .map_err(Self::backend)?;
        Ok(result.rows_affected())
    }

    async fn terms_of(&self, category: &str) -> StoreResult<Vec<Term>> {
        let rows = sqlx::query("SELECT id, name, slug FROM terms WHERE taxonomy = ? ORDER BY id")
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::backend)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                Term {
                    id: id as TermId,
                    name: row.get("name"),
                    slug: row.get("slug"),
                }
            })
            .collect())
    }

    async fn find_term_by_name(&self, category: &str, name: &str) -> StoreResult<Option<Term>> {
        let row = sqlx::query("SELECT id, name, slug FROM terms WHERE taxonomy = ? AND name = ?")
            .bind(category)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::backend)?;
        Ok(row.map(|row| {
            let id: i64 = row.get("id");
            Term {
                id: id as TermId,
                name: row.get("name"),
                slug: row.get("slug"),
            }
        }))
    }

    async fn find_term_by_slug(&self, category: &str, slug: &str) -> StoreResult<Option<Term>> {
        let row = sqlx::query("SELECT id, name, slug FROM terms WHERE taxonomy = ? AND slug = ?")
            .bind(category)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::backend)?;
        Ok(row.map(|row| {
            let id: i64 = row.get("id");
            Term {
                id: id as TermId,
                name: row.get("name"),
                slug: row.get("slug"),
            }
        }))
    }

    async fn get_term(&self, id: TermId) -> StoreResult<Option<TermRef>> {
        let row = sqlx::query("SELECT taxonomy, name, slug FROM terms WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::backend)?;
        Ok(row.map(|row| TermRef {
            id,
            taxonomy: row.get("taxonomy"),
            name: row.get("name"),
            slug: row.get("slug"),
        }))
    }

    async fn create_term(&self, category: &str, name: &str, slug: &str) -> StoreResult<Term> {
        let result = sqlx::query("INSERT INTO terms (taxonomy, name, slug) VALUES (?, ?, ?)")
            .bind(category)
            .bind(name)
            .bind(slug)
            .execute(&self.pool)
            .await;
        match result {
            Ok(done) => Ok(Term {
                id: done.last_insert_rowid() as TermId,
                name: name.to_string(),
                slug: slug.to_string(),
            }),
            Err(sqlx::Error::Database(db))
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Err(StoreError::SlugConflict {
                    category: category.to_string(),
                    slug: slug.to_string(),
                })
            }
            Err(e) => Err(Self::backend(e)),
        }
    }

    async fn update_term(
        &self,
        category: &str,
        id: TermId,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE terms SET name = COALESCE(?, name), slug = COALESCE(?, slug)
             WHERE id = ? AND taxonomy = ?",
        )
        .bind(name)
        .bind(slug)
        .bind(id as i64)
        .bind(category)
        .execute(&self.pool)
        .await;
        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::not_found("term", id)),
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db))
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Err(StoreError::SlugConflict {
                    category: category.to_string(),
                    slug: slug.unwrap_or_default().to_string(),
                })
            }
            Err(e) => Err(Self::backend(e)),
        }
    }

    async fn delete_term(&self, category: &str, id: TermId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM terms WHERE id = ? AND taxonomy = ?")
            .bind(id as i64)
            .bind(category)
            .execute(&self.pool)
            .await
            .map_err(Self::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("term", id));
        }
        Ok(())
    }
}
