use crate::error::Result;
use crate::settings::{keypath, SettingsStore};
use crate::utils::{DebounceSink, Debouncer};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::item::{ConfigurationItem, Implementation};
use super::items::default_items;
use super::r#trait::{ItemBehavior, ItemContext};

/// Writes debounced values once their key has been quiet.
struct StoreSink {
    store: Arc<dyn SettingsStore>,
    degraded: HashMap<&'static str, Arc<AtomicBool>>,
}

#[async_trait]
impl DebounceSink<Value> for StoreSink {
    async fn fire(&self, key: &str, value: Value) {
        let result = self.store.set(key, value).await;
        let failed = match &result {
            Ok(()) => false,
            Err(e) => {
                warn!("{}: debounced write failed: {}", key, e);
                e.is_persistence()
            }
        };
        if let Some(flag) = self.degraded.get(key) {
            flag.store(failed, Ordering::SeqCst);
        }
    }
}

/// Items whose `init` has returned, plus the host-bound ones still waiting.
#[derive(Debug, Default)]
pub struct InitReport {
    pub initialized: usize,
    pub applied: usize,
    pub deferred: Vec<(&'static str, JoinHandle<bool>)>,
}

impl InitReport {
    /// Waits for every deferred application. Returns how many were applied.
    pub async fn wait_deferred(self) -> usize {
        let mut applied = 0;
        for (key, handle) in self.deferred {
            match handle.await {
                Ok(true) => applied += 1,
                Ok(false) => debug!("{}: deferred implement not applied", key),
                Err(e) => warn!("{}: deferred implement task failed: {}", key, e),
            }
        }
        applied
    }
}

/// Source of truth for every configuration item.
pub struct Registry {
    items: Vec<ConfigurationItem>,
    index: HashMap<&'static str, usize>,
    store: Arc<dyn SettingsStore>,
    debouncer: Arc<Debouncer<Value>>,
}

impl Registry {
    /// Registry with the shell's own items.
    pub fn new(store: Arc<dyn SettingsStore>, ctx: ItemContext, write_debounce: Duration) -> Self {
        Self::with_items(store, ctx, write_debounce, default_items())
    }

    pub fn with_items(
        store: Arc<dyn SettingsStore>,
        ctx: ItemContext,
        write_debounce: Duration,
        behaviors: Vec<Box<dyn ItemBehavior>>,
    ) -> Self {
        let degraded: HashMap<&'static str, Arc<AtomicBool>> = behaviors
            .iter()
            .map(|behavior| (behavior.key(), Arc::new(AtomicBool::new(false))))
            .collect();

        let sink = StoreSink {
            store: Arc::clone(&store),
            degraded: degraded.clone(),
        };
        let debouncer: Arc<Debouncer<Value>> = Arc::new(Debouncer::new(write_debounce, Arc::new(sink)));

        let mut items = Vec::with_capacity(behaviors.len());
        let mut index = HashMap::with_capacity(behaviors.len());
        for behavior in behaviors {
            let key = behavior.key();
            if index.contains_key(key) {
                warn!("Duplicate configuration item '{}' ignored", key);
                continue;
            }
            let flag = degraded
                .get(key)
                .cloned()
                .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

            index.insert(key, items.len());
            items.push(ConfigurationItem::new(
                behavior,
                Arc::clone(&store),
                ctx.clone(),
                Arc::clone(&debouncer),
                flag,
            ));
        }

        debug!("Registry created with {} items", items.len());
        Self {
            items,
            index,
            store,
            debouncer,
        }
    }

    /// `None` for keys that are not registered.
    pub fn get_item(&self, key: &str) -> Option<&ConfigurationItem> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    /// Like [`get_item`](Self::get_item), for callers that treat an unknown
    /// key as an error.
    pub fn require_item(&self, key: &str) -> Result<&ConfigurationItem> {
        self.get_item(key)
            .ok_or_else(|| crate::shell_error!(unknown_key, "{}", key))
    }

    pub fn items(&self) -> &[ConfigurationItem] {
        &self.items
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.items.iter().map(ConfigurationItem::key)
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Default of every item, keyed by item key.
    pub fn defaults(&self) -> Value {
        let mut defaults = Value::Object(Map::new());
        for item in &self.items {
            keypath::set(&mut defaults, item.key(), item.default_value());
        }
        defaults
    }

    /// Fills in defaults for values missing from the store, leaving stored
    /// values untouched. Returns how many values were filled in.
    pub async fn apply_defaults(&self) -> Result<usize> {
        let mut doc = self.store.get_all().await?;
        let filled = keypath::fill_defaults(&mut doc, &self.defaults());

        if filled > 0 {
            self.store.set_all(doc).await?;
            info!("Applied {} default setting(s)", filled);
        } else {
            debug!("All defaults already present");
        }
        Ok(filled)
    }

    /// Calls `init` on every item in registration order. Returns once every
    /// `init` has returned; host-bound effects may still be pending in the
    /// report.
    pub async fn initialize_all(&self) -> InitReport {
        let mut report = InitReport::default();
        for item in &self.items {
            match item.init().await {
                Implementation::Applied => report.applied += 1,
                Implementation::Deferred(handle) => report.deferred.push((item.key(), handle)),
                Implementation::Skipped | Implementation::Failed => {}
            }
            report.initialized += 1;
        }

        info!(
            "Initialized {} items ({} applied, {} waiting for host)",
            report.initialized,
            report.applied,
            report.deferred.len()
        );
        report
    }

    /// Deletes stored keys no item is registered under. Registered keys are
    /// never touched. Returns the deleted keys.
    pub async fn remove_unknown_keys(&self) -> Result<Vec<String>> {
        let doc = self.store.get_all().await?;
        let unknown = keypath::unknown_keys(&doc, self.keys());

        let mut removed = Vec::with_capacity(unknown.len());
        for key in unknown {
            match self.store.delete(&key).await {
                Ok(_) => {
                    debug!("Removed unknown setting '{}'", key);
                    removed.push(key);
                }
                Err(e) => warn!("Failed to remove unknown setting '{}': {}", key, e),
            }
        }

        if !removed.is_empty() {
            info!("Removed {} unknown setting(s)", removed.len());
        }
        Ok(removed)
    }

    /// Startup sequence: defaults, then init, then cleanup. Store failures
    /// are logged and leave items on their defaults.
    pub async fn startup(&self) -> InitReport {
        if let Err(e) = self.apply_defaults().await {
            warn!("Failed to apply default settings: {}", e);
        }

        let report = self.initialize_all().await;

        if let Err(e) = self.remove_unknown_keys().await {
            warn!("Failed to clean up unknown settings: {}", e);
        }
        report
    }

    /// Writes every pending debounced value now.
    pub async fn flush(&self) -> usize {
        self.debouncer.flush().await
    }

    /// Records quit-time values, flushes pending writes and stops listening
    /// to the window.
    pub async fn shutdown(&self) {
        for item in &self.items {
            item.stop_listener();
            if let Err(e) = item.capture_for_quit().await {
                warn!("{}: failed to save before quit: {}", item.key(), e);
            }
        }

        let flushed = self.flush().await;
        debug!("Flushed {} pending write(s)", flushed);
    }

    /// Deletes every stored setting, including pending debounced writes.
    pub async fn reset(&self) -> Result<()> {
        for item in &self.items {
            self.debouncer.cancel(item.key());
        }
        self.store.clear().await?;
        info!("All settings deleted");
        Ok(())
    }
}
