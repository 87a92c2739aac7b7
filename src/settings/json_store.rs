use crate::error::{Result, ShellError};
use crate::events::SettingChange;
use crate::trace_if_enabled;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::keypath;
use super::store::SettingsStore;

/// Settings document kept in memory and mirrored to a pretty-printed JSON
/// file on every change.
///
/// Same-key operations queue on a per-key fair mutex. `set_all` and `clear`
/// take the document gate exclusively, so they never interleave with a
/// single-key operation.
pub struct JsonFileStore {
    path: Option<PathBuf>,
    doc: parking_lot::RwLock<Value>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
    gate: RwLock<()>,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<SettingChange>,
}

impl JsonFileStore {
    /// Loads `path`. A missing file starts an empty document; an unreadable
    /// one is moved aside to `<name>.corrupt` and also starts empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let doc = match fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(doc @ Value::Object(_)) => doc,
                Ok(_) | Err(_) => {
                    let backup = sibling(&path, "corrupt");
                    warn!(
                        "Settings file {} is not a JSON object, moving it to {}",
                        path.display(),
                        backup.display()
                    );
                    fs::rename(&path, &backup)
                        .await
                        .map_err(|source| persistence(&path, source))?;
                    empty()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings file at {}, starting empty", path.display());
                empty()
            }
            Err(source) => return Err(persistence(&path, source)),
        };

        info!("Settings loaded from {}", path.display());
        Ok(Self::with_document(Some(path), doc))
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self::with_document(None, empty())
    }

    fn with_document(path: Option<PathBuf>, doc: Value) -> Self {
        let (changes, _) = broadcast::channel(128);
        Self {
            path,
            doc: parking_lot::RwLock::new(doc),
            key_locks: DashMap::new(),
            gate: RwLock::new(()),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.key_locks.entry(key.to_string()).or_default().value())
    }

    /// Writes the current document. Callers hold `write_lock` from the
    /// in-memory change until the write (or its rollback) is done, so no
    /// other write can put an uncommitted value on disk.
    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let text = serde_json::to_string_pretty(&*self.doc.read())?;
        write_atomic(path, &text)
            .await
            .map_err(|source| persistence(path, source))?;
        trace_if_enabled!("Settings written to {}", path.display());
        Ok(())
    }

    fn publish(&self, change: SettingChange) {
        debug!("Setting changed: {}", change);
        // Nobody subscribed is fine.
        let _ = self.changes.send(change);
    }

    fn restore(&self, key: &str, previous: Option<Value>) {
        let mut doc = self.doc.write();
        match previous {
            Some(value) => {
                keypath::set(&mut doc, key, value);
            }
            None => {
                keypath::remove(&mut doc, key);
            }
        }
    }
}

#[async_trait::async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _gate = self.gate.read().await;
        let lock = self.key_lock(key);
        let _key = lock.lock().await;

        let doc = self.doc.read();
        Ok(keypath::get(&doc, key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _gate = self.gate.read().await;
        let lock = self.key_lock(key);
        let _key = lock.lock().await;

        let _write = self.write_lock.lock().await;
        let previous = keypath::set(&mut self.doc.write(), key, value.clone());
        if let Err(e) = self.persist().await {
            self.restore(key, previous);
            return Err(e);
        }

        if previous.as_ref() != Some(&value) {
            self.publish(SettingChange::new(key, Some(value), previous));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _gate = self.gate.read().await;
        let lock = self.key_lock(key);
        let _key = lock.lock().await;

        let _write = self.write_lock.lock().await;
        let Some(previous) = keypath::remove(&mut self.doc.write(), key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist().await {
            self.restore(key, Some(previous));
            return Err(e);
        }

        self.publish(SettingChange::new(key, None, Some(previous)));
        Ok(true)
    }

    async fn get_all(&self) -> Result<Value> {
        let _gate = self.gate.read().await;
        Ok(self.doc.read().clone())
    }

    async fn set_all(&self, doc: Value) -> Result<()> {
        let doc = match doc {
            Value::Object(_) => doc,
            other => {
                return Err(crate::shell_error!(
                    internal,
                    "settings document must be a JSON object, got {}",
                    other
                ))
            }
        };

        let _gate = self.gate.write().await;
        let _write = self.write_lock.lock().await;
        let previous = std::mem::replace(&mut *self.doc.write(), doc.clone());
        if let Err(e) = self.persist().await {
            *self.doc.write() = previous;
            return Err(e);
        }

        for change in top_level_changes(&previous, &doc) {
            self.publish(change);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.set_all(empty()).await
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }

    fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

fn persistence(path: &Path, source: std::io::Error) -> ShellError {
    ShellError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

/// `settings.json` -> `settings.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Write to a temporary sibling, fsync, then rename over the target.
async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = sibling(path, "tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await
}

fn top_level_changes(before: &Value, after: &Value) -> Vec<SettingChange> {
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return Vec::new();
    };

    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter(|key| before.get(*key) != after.get(*key))
        .map(|key| SettingChange::new(key.as_str(), after.get(key).cloned(), before.get(key).cloned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_and_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.set("windowAlwaysOnTop", json!(false)).await.unwrap();
        store.set("user.playlistId", json!("PL123")).await.unwrap();
        assert_eq!(store.get("windowAlwaysOnTop").await.unwrap(), Some(json!(false)));

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("windowAlwaysOnTop").await.unwrap(), Some(json!(false)));
        assert_eq!(reopened.get("user.playlistId").await.unwrap(), Some(json!("PL123")));
        assert_eq!(reopened.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_pretty_json_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.set("filterAds", json!(true)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"filterAds\": true"));
        assert!(!sibling(&path, "tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(store.get_all().await.unwrap(), json!({}));
        assert!(sibling(&path, "corrupt").exists());
    }

    #[tokio::test]
    async fn failed_write_surfaces_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");

        let store = JsonFileStore::open(blocker.join("settings.json")).await.unwrap();
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let err = store.set("filterAds", json!(false)).await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(store.get("filterAds").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_writes_never_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        let path = blocker.join("settings.json");
        let store = Arc::new(JsonFileStore::open(&path).await.unwrap());

        std::fs::write(&blocker, "file, not a directory").unwrap();
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set(&format!("failed{}", i), json!(i)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(store.get_all().await.unwrap(), json!({}));

        std::fs::remove_file(&blocker).unwrap();
        store.set("kept", json!(true)).await.unwrap();

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"kept": true}));
        assert_eq!(on_disk, store.get_all().await.unwrap());
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = JsonFileStore::in_memory();
        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!(2)).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.get_all().await.unwrap(), json!({"b": 2}));

        store.clear().await.unwrap();
        assert_eq!(store.get_all().await.unwrap(), json!({}));
        assert!(store.location().is_none());
    }

    #[tokio::test]
    async fn set_all_rejects_non_objects() {
        let store = JsonFileStore::in_memory();
        assert!(store.set_all(json!([1, 2])).await.is_err());
    }

    #[tokio::test]
    async fn subscribers_see_committed_changes() {
        let store = JsonFileStore::in_memory();
        let mut changes = store.subscribe();

        store.set("playlistId", json!("PL1")).await.unwrap();
        store.set("playlistId", json!("PL1")).await.unwrap();
        store.set_all(json!({"playerType": "embed"})).await.unwrap();

        let first = changes.recv().await.unwrap();
        assert_eq!(first.key, "playlistId");
        assert_eq!(first.new_value, Some(json!("PL1")));
        assert_eq!(first.old_value, None);

        let mut rest = vec![changes.recv().await.unwrap(), changes.recv().await.unwrap()];
        rest.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(rest[0].key, "playerType");
        assert_eq!(rest[1].key, "playlistId");
        assert_eq!(rest[1].new_value, None);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn same_key_operations_keep_issue_order() {
        let store = Arc::new(JsonFileStore::in_memory());

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set(&format!("key{}", i % 4), json!(i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let doc = store.get_all().await.unwrap();
        assert_eq!(doc.as_object().unwrap().len(), 4);

        store.set("k", json!(1)).await.unwrap();
        store.set("k", json!(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }
}
