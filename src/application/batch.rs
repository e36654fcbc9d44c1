//! Batch driver: caller-resumed, page-at-a-time reconciliation.
//!
//! The driver holds no session state. Each step processes exactly one page
//! for the requested operation and returns the advanced cursor; the caller
//! loops until `done`. A failing item is logged and skipped so the page
//! finishes with partial detail; a failing *page fetch* is returned as an
//! error the caller classifies with [`is_retryable`] and resubmits.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::dto::{
    BatchCursor, BatchStepRequest, BatchStepResponse, OperationKind,
};
use crate::application::merge::MergeOperation;
use crate::application::repair::RepairOperation;
use crate::application::rescue::RescueOperation;
use crate::domain::entities::ItemKind;
use crate::domain::store::{CatalogStore, StoreError};
use crate::infrastructure::config::BatchConfig;

/// Whether an error returned by [`BatchDriver::step`] should be retried
/// with the identical request.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<StoreError>()
        .is_some_and(StoreError::is_retryable)
}

pub struct BatchDriver {
    store: Arc<dyn CatalogStore>,
    merge: MergeOperation,
    repair: RepairOperation,
    rescue: RescueOperation,
    config: BatchConfig,
}

impl BatchDriver {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        audit: Arc<dyn crate::domain::audit::AuditSink>,
        config: BatchConfig,
    ) -> Self {
        Self {
            merge: MergeOperation::new(Arc::clone(&store), Arc::clone(&audit)),
            repair: RepairOperation::new(Arc::clone(&store), Arc::clone(&audit)),
            rescue: RescueOperation::new(Arc::clone(&store), Arc::clone(&audit)),
            store,
            config,
        }
    }

    /// Process one page for the request and report progress. Exactly
    /// ceil(N / page_size) successful steps reach `done` for N items.
    pub async fn step(&self, request: &BatchStepRequest) -> Result<BatchStepResponse> {
        match request.operation {
            OperationKind::Merge => self.merge_step(request).await,
            OperationKind::Repair => self.repair_step(request).await,
            OperationKind::Rescue => self.rescue_step(request).await,
        }
    }

    async fn merge_step(&self, request: &BatchStepRequest) -> Result<BatchStepResponse> {
        let Some(target) = request.target_category.as_deref() else {
            bail!("merge requires a target category");
        };
        if request.source_categories.is_empty() {
            bail!("merge requires at least one source category");
        }
        if request.source_categories.iter().any(|s| s == target) {
            bail!("target category cannot be one of the sources");
        }

        let page = self
            .store
            .fetch_items_page(
                &[ItemKind::Simple, ItemKind::Variable],
                request.cursor.page,
                self.config.merge_page_size,
            )
            .await?;

        let mut log = String::new();
        let mut processed = 0u32;
        for item in &page.items {
            match self
                .merge
                .run_item(item, target, &request.source_categories, request.dry_run)
                .await
            {
                Ok(outcome) => log.push_str(&outcome.log_line),
                Err(e) => {
                    warn!(item = item.id, error = %e, "merge failed for item; continuing page");
                    log.push_str(&format!("MERGE | {} | ERROR | {}\n", item.id, e));
                }
            }
            processed += 1;
        }

        Ok(self.page_response(request.cursor, processed, &page, log))
    }

    async fn repair_step(&self, request: &BatchStepRequest) -> Result<BatchStepResponse> {
        let page = self
            .store
            .fetch_items_page(
                &[ItemKind::Variable],
                request.cursor.page,
                self.config.repair_page_size,
            )
            .await?;

        let mut log = String::new();
        let mut processed = 0u32;
        for item in &page.items {
            match self.repair.run_item(item, request.dry_run).await {
                Ok(outcome) => log.push_str(&outcome.log_line),
                Err(e) => {
                    warn!(item = item.id, error = %e, "repair failed for item; continuing page");
                    log.push_str(&format!("REPAIR | {} | ERROR | {}\n", item.id, e));
                }
            }
            processed += 1;
        }

        Ok(self.page_response(request.cursor, processed, &page, log))
    }

    /// Rescue is a single-step operation over one category's terms; it
    /// always completes in one page.
    async fn rescue_step(&self, request: &BatchStepRequest) -> Result<BatchStepResponse> {
        let Some(category) = request.target_category.as_deref() else {
            bail!("rescue requires a category");
        };

        let total = self.store.terms_of(category).await?.len() as u64;
        let outcomes = self.rescue.run_category(category, request.dry_run).await?;
        let mut log = String::new();
        for outcome in &outcomes {
            log.push_str(&outcome.log_line);
        }
        if outcomes.is_empty() {
            log.push_str("RESCUE | N/A | INFO | Nothing to fix.\n");
        }

        info!(category, fixed = outcomes.len(), "rescue pass complete");
        Ok(BatchStepResponse {
            done: true,
            items_processed: outcomes.len() as u32,
            total_items: total,
            log,
            next_cursor: request.cursor.advanced(),
            run_id: Uuid::new_v4(),
        })
    }

    fn page_response(
        &self,
        cursor: BatchCursor,
        processed: u32,
        page: &crate::domain::entities::ItemPage,
        log: String,
    ) -> BatchStepResponse {
        let done = cursor.page >= page.total_pages;
        BatchStepResponse {
            done,
            items_processed: processed,
            total_items: page.total_count,
            log,
            next_cursor: cursor.advanced(),
            run_id: Uuid::new_v4(),
        }
    }
}
