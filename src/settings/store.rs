use crate::config::Config;
use crate::events::SettingChange;
use anyhow::Context;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::json_store::JsonFileStore;

/// Durable key-value store of user and internal preferences.
///
/// Keys are dot-delimited paths into one JSON document. Operations on the
/// same key complete in the order they were issued.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> crate::error::Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> crate::error::Result<()>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> crate::error::Result<bool>;

    /// The whole document.
    async fn get_all(&self) -> crate::error::Result<Value>;

    /// Replaces the whole document.
    async fn set_all(&self, doc: Value) -> crate::error::Result<()>;

    async fn clear(&self) -> crate::error::Result<()>;

    /// Changes committed after this call.
    fn subscribe(&self) -> broadcast::Receiver<SettingChange>;

    /// Backing file, `None` for in-memory stores.
    fn location(&self) -> Option<&Path>;
}

/// Opens the store selected by the configuration; `dry_run` keeps
/// everything in memory.
pub async fn create_settings_store(
    config: &Config,
    dry_run: bool,
) -> anyhow::Result<Arc<dyn SettingsStore>> {
    if dry_run {
        return Ok(Arc::new(JsonFileStore::in_memory()));
    }

    let path = config.settings_path()?;
    let store = JsonFileStore::open(&path)
        .await
        .with_context(|| format!("Failed to open settings store at {}", path.display()))?;
    Ok(Arc::new(store))
}
