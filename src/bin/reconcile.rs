//! Command-line driver for the reconciliation engine.
//!
//! Runs an operation to completion by stepping the batch driver, printing
//! the accumulated screen log as pages finish.
//!
//! Usage:
//!   reconcile merge <target> <source> [<source>...] [--dry-run]
//!   reconcile repair [--dry-run]
//!   reconcile repair-item <item_id> [--dry-run]
//!   reconcile rescue <category> [--dry-run]
//!   reconcile inspect <item_id>
//!   reconcile manual-merge <category> <from_term> <to_term>
//!
//! Common flags: --db <url> (default sqlite:./data/catalog.db),
//! --config <path> (default ./reconciler_config.json)

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::warn;

use attr_reconciler::application::batch::{is_retryable, BatchDriver};
use attr_reconciler::application::dto::{BatchCursor, BatchStepRequest, OperationKind};
use attr_reconciler::application::inspector::Inspector;
use attr_reconciler::application::repair::RepairOperation;
use attr_reconciler::application::rescue::RescueOperation;
use attr_reconciler::domain::audit::AuditSink;
use attr_reconciler::domain::store::CatalogStore;
use attr_reconciler::infrastructure::{
    init_logging, ConfigManager, FileAuditLog, SqliteCatalogStore,
};

const MAX_RETRIES: u32 = 3;

struct CliArgs {
    command: String,
    positional: Vec<String>,
    dry_run: bool,
    db_url: String,
    config_path: String,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        bail!("usage: reconcile <merge|repair|repair-item|rescue|inspect|manual-merge> [args...]");
    };

    let mut positional = Vec::new();
    let mut dry_run = false;
    let mut db_url = "sqlite:./data/catalog.db".to_string();
    let mut config_path = "./reconciler_config.json".to_string();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "--db" => db_url = args.next().context("--db requires a value")?,
            "--config" => config_path = args.next().context("--config requires a value")?,
            other if other.starts_with("--") => bail!("unknown flag: {other}"),
            _ => positional.push(arg),
        }
    }

    Ok(CliArgs {
        command,
        positional,
        dry_run,
        db_url,
        config_path,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;

    let config = ConfigManager::new(&args.config_path).load_config().await?;
    init_logging(&config.logging, &config.audit_dir)?;

    let store: Arc<dyn CatalogStore> =
        Arc::new(SqliteCatalogStore::connect(&args.db_url).await?);
    let audit: Arc<dyn AuditSink> = Arc::new(FileAuditLog::open(&config.audit_dir)?);

    match args.command.as_str() {
        "merge" => {
            if args.positional.len() < 2 {
                bail!("usage: reconcile merge <target> <source> [<source>...]");
            }
            let request = BatchStepRequest {
                operation: OperationKind::Merge,
                target_category: Some(args.positional[0].clone()),
                source_categories: args.positional[1..].to_vec(),
                dry_run: args.dry_run,
                cursor: BatchCursor::start(),
            };
            let driver = BatchDriver::new(store, audit, config.batch);
            run_to_completion(&driver, request).await
        }
        "repair" => {
            let request = BatchStepRequest {
                operation: OperationKind::Repair,
                target_category: None,
                source_categories: Vec::new(),
                dry_run: args.dry_run,
                cursor: BatchCursor::start(),
            };
            let driver = BatchDriver::new(store, audit, config.batch);
            run_to_completion(&driver, request).await
        }
        "rescue" => {
            let [category] = args.positional.as_slice() else {
                bail!("usage: reconcile rescue <category>");
            };
            let request = BatchStepRequest {
                operation: OperationKind::Rescue,
                target_category: Some(category.clone()),
                source_categories: Vec::new(),
                dry_run: args.dry_run,
                cursor: BatchCursor::start(),
            };
            let driver = BatchDriver::new(store, audit, config.batch);
            run_to_completion(&driver, request).await
        }
        "repair-item" => {
            let [raw_id] = args.positional.as_slice() else {
                bail!("usage: reconcile repair-item <item_id>");
            };
            let item_id = raw_id.parse().context("item id must be numeric")?;
            let repair = RepairOperation::new(store, audit);
            let outcome = repair.run_by_id(item_id, args.dry_run).await?;
            if outcome.state_changing {
                print!("{}", outcome.log_line);
            } else {
                println!("Item {item_id}: {}", outcome.detail);
            }
            Ok(())
        }
        "inspect" => {
            let [raw_id] = args.positional.as_slice() else {
                bail!("usage: reconcile inspect <item_id>");
            };
            let item_id = raw_id.parse().context("item id must be numeric")?;
            let inspector = Inspector::new(store);
            match inspector.inspect(item_id).await? {
                Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                None => println!("Item {item_id} not found."),
            }
            Ok(())
        }
        "manual-merge" => {
            let [category, from, to] = args.positional.as_slice() else {
                bail!("usage: reconcile manual-merge <category> <from_term> <to_term>");
            };
            let from = from.parse().context("from_term must be a term id")?;
            let to = to.parse().context("to_term must be a term id")?;
            let rescue = RescueOperation::new(store, audit);
            let line = rescue.manual_merge(category, from, to).await?;
            print!("{line}");
            Ok(())
        }
        other => bail!("unknown command: {other}"),
    }
}

/// Step the driver until `done`, retrying retryable page failures.
async fn run_to_completion(driver: &BatchDriver, mut request: BatchStepRequest) -> Result<()> {
    let mut retries = 0u32;
    loop {
        match driver.step(&request).await {
            Ok(response) => {
                retries = 0;
                print!("{}", response.log);
                println!(
                    "-- page {} done ({} items this page, {} total) --",
                    request.cursor.page, response.items_processed, response.total_items
                );
                if response.done {
                    println!("Run complete.");
                    return Ok(());
                }
                request.cursor = response.next_cursor;
            }
            Err(e) if is_retryable(&e) && retries < MAX_RETRIES => {
                retries += 1;
                warn!(page = request.cursor.page, attempt = retries, error = %e, "retrying page");
                tokio::time::sleep(std::time::Duration::from_millis(250 * u64::from(retries)))
                    .await;
            }
            Err(e) => return Err(e),
        }
    }
}
