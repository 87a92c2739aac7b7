use crate::error::Result;
use crate::events::{Bounds, RequestDecision, RequestDetails, WindowEvent};
use crate::utils::ReadySignal;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Linux,
        }
    }
}

/// Decides the fate of every outbound request of a session.
pub trait RequestInterceptor: Send + Sync {
    fn on_before_request(&self, request: &RequestDetails) -> RequestDecision;
}

/// One network/storage context (partition).
pub trait Session: Send + Sync {
    fn partition(&self) -> &str;

    fn is_alive(&self) -> bool;

    /// Installs `interceptor`, replacing the previous one: a session holds at
    /// most one interceptor. `None` removes it. Fails on disposed sessions.
    fn set_interceptor(&self, interceptor: Option<Arc<dyn RequestInterceptor>>) -> Result<()>;

    fn has_interceptor(&self) -> bool;

    /// Drops cache, cookies and web storage of the partition.
    fn clear_storage(&self) -> Result<()>;
}

/// The main window as far as configuration items are concerned.
pub trait HostWindow: Send + Sync {
    fn is_alive(&self) -> bool;

    fn set_always_on_top(&self, enabled: bool);
    fn is_always_on_top(&self) -> bool;

    fn set_skip_taskbar(&self, skip: bool);
    fn set_ignore_mouse_events(&self, ignore: bool);
    fn set_has_shadow(&self, shadow: bool);

    /// Toggles a class on the root element of the window content.
    fn set_content_class(&self, class: &str, enabled: bool);

    fn set_bounds(&self, bounds: Bounds);
    fn bounds(&self) -> Bounds;

    fn show(&self);
    fn hide(&self);
    fn is_visible(&self) -> bool;
}

pub trait Host: Send + Sync {
    fn platform(&self) -> Platform;

    /// `None` until the main window has been created.
    fn primary_window(&self) -> Option<Arc<dyn HostWindow>>;

    fn session(&self, partition: &str) -> Option<Arc<dyn Session>>;

    fn sessions(&self) -> Vec<Arc<dyn Session>>;

    /// Published once the main window and its sessions exist.
    fn ready(&self) -> ReadySignal;

    fn window_events(&self) -> broadcast::Receiver<WindowEvent>;

    /// macOS only; other platforms ignore it.
    fn set_dock_visible(&self, visible: bool);
}
