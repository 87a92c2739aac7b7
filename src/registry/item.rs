use crate::error::{Result, ShellError};
use crate::events::settings::is_below;
use crate::events::SettingChange;
use crate::settings::{keypath, SettingsStore};
use crate::utils::Debouncer;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::r#trait::{ApplyTarget, ItemBehavior, ItemContext, Persistence};

/// Outcome of applying a value to live state.
#[derive(Debug)]
pub enum Implementation {
    /// The item has no live effect for this call.
    Skipped,
    Applied,
    Failed,
    /// Waiting for the host. Resolves to whether the value was applied; a
    /// newer `implement` call on the same item supersedes this one.
    Deferred(JoinHandle<bool>),
}

impl Implementation {
    /// Waits for a deferred application. `true` if the value was applied.
    pub async fn wait(self) -> bool {
        match self {
            Implementation::Applied => true,
            Implementation::Skipped | Implementation::Failed => false,
            Implementation::Deferred(handle) => handle.await.unwrap_or(false),
        }
    }
}

struct ItemInner {
    behavior: Box<dyn ItemBehavior>,
    store: Arc<dyn SettingsStore>,
    ctx: ItemContext,
    debouncer: Arc<Debouncer<Value>>,
    degraded: Arc<AtomicBool>,
    implement_seq: AtomicU64,
    initialized: AtomicBool,
    listener: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// A named persisted setting with an optional live effect. Cheap to clone.
#[derive(Clone)]
pub struct ConfigurationItem {
    inner: Arc<ItemInner>,
}

impl ConfigurationItem {
    pub(crate) fn new(
        behavior: Box<dyn ItemBehavior>,
        store: Arc<dyn SettingsStore>,
        ctx: ItemContext,
        debouncer: Arc<Debouncer<Value>>,
        degraded: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner: Arc::new(ItemInner {
                behavior,
                store,
                ctx,
                debouncer,
                degraded,
                implement_seq: AtomicU64::new(0),
                initialized: AtomicBool::new(false),
                listener: parking_lot::Mutex::new(None),
            }),
        }
    }

    pub fn key(&self) -> &'static str {
        self.inner.behavior.key()
    }

    pub fn default_value(&self) -> Value {
        self.inner.behavior.default_value()
    }

    pub fn persistence(&self) -> Persistence {
        self.inner.behavior.persistence()
    }

    /// `true` after a settings read or write failed; `get` then returns the
    /// default until a write succeeds again.
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded.load(Ordering::SeqCst)
    }

    /// Current value: a debounced value not yet written, else the stored
    /// value, else the default.
    pub async fn get(&self) -> Value {
        let key = self.key();

        if self.persistence() == Persistence::Debounced {
            if let Some(value) = self.inner.debouncer.pending(key) {
                return value;
            }
        }

        if self.is_degraded() {
            return self.default_value();
        }

        match self.inner.store.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => self.default_value(),
            Err(e) => {
                warn!("{}: read failed, using default: {}", key, e);
                self.inner.degraded.store(true, Ordering::SeqCst);
                self.default_value()
            }
        }
    }

    pub async fn get_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.get().await)?)
    }

    /// Applies `value` (when the item acts on set) and persists it.
    ///
    /// Immediate items resolve once the value is on disk; debounced items
    /// resolve at once and write after the quiet period.
    pub async fn set(&self, value: Value) -> Result<Implementation> {
        let key = self.key();
        debug!("{}: set {}", key, value);

        let implementation = if self.inner.behavior.implements_on_set() {
            self.implement(value.clone())
        } else {
            Implementation::Skipped
        };

        match self.persistence() {
            Persistence::Debounced => self.inner.debouncer.push(key, value),
            Persistence::Immediate => match self.inner.store.set(key, value).await {
                Ok(()) => {
                    self.inner.degraded.store(false, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!("{}: write failed: {}", key, e);
                    if e.is_persistence() {
                        self.inner.degraded.store(true, Ordering::SeqCst);
                    }
                    return Err(e);
                }
            },
        }

        Ok(implementation)
    }

    /// Applies `value` to live state. Host-bound items wait for the host
    /// without blocking the caller; each call applies at most once.
    pub fn implement(&self, value: Value) -> Implementation {
        let seq = self.inner.implement_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = &self.inner.ctx;

        if self.inner.behavior.target() == ApplyTarget::Detached || ctx.host.ready().is_ready() {
            return if self.apply(&value) {
                Implementation::Applied
            } else {
                Implementation::Failed
            };
        }

        debug!("{}: waiting for host before implementing", self.key());
        let item = self.clone();
        let ready = ctx.host.ready();
        let timeout = ctx.ready_timeout;

        Implementation::Deferred(tokio::spawn(async move {
            if let Err(e) = ready.wait(timeout).await {
                debug!("{}: not implemented: {}", item.key(), e);
                return false;
            }
            if item.inner.implement_seq.load(Ordering::SeqCst) != seq {
                debug!("{}: deferred value superseded", item.key());
                return false;
            }
            item.apply(&value)
        }))
    }

    fn apply(&self, value: &Value) -> bool {
        let key = self.key();
        match self.inner.behavior.apply(value, &self.inner.ctx) {
            Ok(()) => {
                debug!("{}: implemented {}", key, value);
                true
            }
            Err(e @ ShellError::TargetNotReady(_)) => {
                debug!("{}: {}", key, e);
                false
            }
            Err(e) => {
                warn!("{}: implement failed: {}", key, e);
                false
            }
        }
    }

    /// Runs once: applies the stored value for items that act on init and
    /// starts tracking window events for items that listen to them. Returns
    /// without waiting for the host.
    pub async fn init(&self) -> Implementation {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            debug!("{}: already initialized", self.key());
            return Implementation::Skipped;
        }

        if self.inner.behavior.listens_to_window() {
            self.start_listener();
        }

        if self.inner.behavior.implements_on_init() {
            let value = self.get().await;
            self.implement(value)
        } else {
            Implementation::Skipped
        }
    }

    fn start_listener(&self) {
        // Subscribe before the window exists so early events are not lost.
        let mut events = self.inner.ctx.host.window_events();
        let item = self.clone();

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(value) = item.inner.behavior.value_from_event(&event) else {
                            continue;
                        };
                        if let Err(e) = item.set(value).await {
                            warn!("{}: failed to record {}: {}", item.key(), event, e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("{}: skipped {} window events", item.key(), skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.inner.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_listener(&self) {
        if let Some(handle) = self.inner.listener.lock().take() {
            handle.abort();
        }
    }

    /// Records the value this item wants saved at quit, if any.
    pub async fn capture_for_quit(&self) -> Result<bool> {
        let Some(window) = self.inner.ctx.live_window() else {
            return Ok(false);
        };
        let Some(value) = self.inner.behavior.capture_on_quit(window.as_ref()) else {
            return Ok(false);
        };

        info!("{}: saving {} before quit", self.key(), value);
        self.set(value).await?;
        Ok(true)
    }

    /// Calls `callback(new, old)` whenever the stored value changes, whether
    /// the write was to this key, below it or to one of its parents. `None`
    /// means the key is unset. Runs until the returned handle is aborted.
    pub fn watch<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(Option<Value>, Option<Value>) + Send + Sync + 'static,
    {
        let mut changes = self.inner.store.subscribe();
        let item = self.clone();
        debug!("{}: watch", item.key());

        tokio::spawn(async move {
            let key = item.key();
            loop {
                match changes.recv().await {
                    Ok(change) if change.key == key => callback(change.new_value, change.old_value),
                    Ok(change) if change.concerns(key) => {
                        let current = if is_below(key, &change.key) {
                            None
                        } else {
                            item.inner.store.get(key).await.ok().flatten()
                        };
                        let (new, old) = scoped_values(&change, key, current);
                        if new != old {
                            callback(new, old);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{}: watcher missed {} changes", key, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// New and old value of `key` for a change made at a parent or child path.
/// `current` is the stored value of `key` and is only used for child changes.
fn scoped_values(
    change: &SettingChange,
    key: &str,
    current: Option<Value>,
) -> (Option<Value>, Option<Value>) {
    if is_below(key, &change.key) {
        let rel = &key[change.key.len() + 1..];
        let pick = |value: &Option<Value>| value.as_ref().and_then(|v| keypath::get(v, rel)).cloned();
        return (pick(&change.new_value), pick(&change.old_value));
    }

    let rel = &change.key[key.len() + 1..];
    let mut old = current.clone().unwrap_or_else(|| Value::Object(Default::default()));
    match &change.old_value {
        Some(value) => {
            keypath::set(&mut old, rel, value.clone());
        }
        None => {
            keypath::remove(&mut old, rel);
        }
    }
    (current, Some(old))
}

impl std::fmt::Debug for ConfigurationItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationItem")
            .field("key", &self.key())
            .field("persistence", &self.persistence())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}
