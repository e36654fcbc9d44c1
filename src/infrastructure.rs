//! Infrastructure layer: persistence adapters, audit sinks, configuration
//! and logging.

pub mod audit_log;
pub mod config;
pub mod logging;
pub mod memory_store;
pub mod sqlite_store;

// Re-export commonly used items
pub use audit_log::{FileAuditLog, MemoryAuditLog};
pub use config::{BatchConfig, ConfigManager, LoggingConfig, ReconcilerConfig};
pub use logging::init_logging;
pub use memory_store::MemoryCatalogStore;
pub use sqlite_store::SqliteCatalogStore;
