//! Configuration loading and management.
//!
//! Settings live in a single JSON file next to the data directory. Loading
//! is forgiving: a missing file yields (and persists) the defaults so first
//! runs need no setup step.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "reconciler_config.json";

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Batch sizing for the paginated operations.
    pub batch: BatchConfig,

    /// Directory the audit log files are written to.
    pub audit_dir: PathBuf,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Page sizes for the caller-resumed batch driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items per merge step. Merge touches declarations and children of
    /// every matched item, so pages stay small.
    pub merge_page_size: u32,

    /// Items per repair step. Repair walks every child of a variable item,
    /// which can be hundreds of records, hence one item per step.
    pub repair_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,

    /// Also write tracing output to a rotating file under `audit_dir`.
    pub file_output: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            audit_dir: PathBuf::from("./logs"),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            merge_page_size: 10,
            repair_page_size: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_output: false,
        }
    }
}

/// Loads and persists [`ReconcilerConfig`] at a fixed path.
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn at_default_path() -> Self {
        Self::new(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from file, creating the default if it doesn't
    /// exist yet.
    pub async fn load_config(&self) -> Result<ReconcilerConfig> {
        if !self.config_path.exists() {
            info!(path = ?self.config_path, "configuration file not found, creating default");
            let default_config = ReconcilerConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", self.config_path))?;
        info!(path = ?self.config_path, "loaded configuration");
        Ok(config)
    }

    /// Save configuration to file.
    pub async fn save_config(&self, config: &ReconcilerConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;
        info!(path = ?self.config_path, "saved configuration");
        Ok(())
    }
}
