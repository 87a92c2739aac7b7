use crate::error::Result;
use crate::events::WindowEvent;
use crate::services::host::{Host, HostWindow};
use crate::services::request_filter::RequestFilter;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// How `set` reaches the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Immediate,
    /// Coalesced by the registry debouncer.
    Debounced,
}

/// What `apply` acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyTarget {
    /// Nothing that needs the host; applied right away.
    Detached,
    /// The main window or its sessions; applied once the host is ready.
    Host,
}

/// Live objects an item may act on.
#[derive(Clone)]
pub struct ItemContext {
    pub host: Arc<dyn Host>,
    pub filter: Arc<RequestFilter>,
    /// `None` waits for the host forever.
    pub ready_timeout: Option<Duration>,
}

impl ItemContext {
    pub fn new(host: Arc<dyn Host>, filter: Arc<RequestFilter>, ready_timeout: Option<Duration>) -> Self {
        Self {
            host,
            filter,
            ready_timeout,
        }
    }

    /// The main window, if it exists and has not been destroyed.
    pub fn live_window(&self) -> Option<Arc<dyn HostWindow>> {
        self.host.primary_window().filter(|window| window.is_alive())
    }

    pub fn require_window(&self, key: &str) -> Result<Arc<dyn HostWindow>> {
        self.live_window()
            .ok_or_else(|| crate::shell_error!(not_ready, "{}: main window is gone", key))
    }
}

/// Behavior of one configuration item. Everything except `key` and
/// `default_value` has a no-op default.
pub trait ItemBehavior: Send + Sync {
    fn key(&self) -> &'static str;

    fn default_value(&self) -> Value;

    fn persistence(&self) -> Persistence {
        Persistence::Immediate
    }

    fn target(&self) -> ApplyTarget {
        ApplyTarget::Detached
    }

    /// Apply the stored value during `init`.
    fn implements_on_init(&self) -> bool {
        false
    }

    /// Apply every value passed to `set`.
    fn implements_on_set(&self) -> bool {
        false
    }

    /// Applies `value` to live state. Must be idempotent.
    fn apply(&self, _value: &Value, _ctx: &ItemContext) -> Result<()> {
        Ok(())
    }

    /// Value to store in response to a window event, if this item tracks it.
    fn value_from_event(&self, _event: &WindowEvent) -> Option<Value> {
        None
    }

    /// Whether `init` should subscribe to window events.
    fn listens_to_window(&self) -> bool {
        false
    }

    /// Value to store when the application quits.
    fn capture_on_quit(&self, _window: &dyn HostWindow) -> Option<Value> {
        None
    }
}
