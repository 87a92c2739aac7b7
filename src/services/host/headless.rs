use crate::error::{Result, ShellError};
use crate::events::{Bounds, RequestDecision, RequestDetails, WindowEvent};
use crate::utils::{ready_channel, ReadyPublisher, ReadySignal};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::r#trait::{Host, HostWindow, Platform, RequestInterceptor, Session};

/// In-process host: keeps window and session state in memory and logs what a
/// native host would do. Used by the binary and by tests.
pub struct HeadlessHost {
    platform: Platform,
    partitions: Vec<String>,
    window: RwLock<Option<Arc<HeadlessWindow>>>,
    sessions: DashMap<String, Arc<HeadlessSession>>,
    ready: ReadyPublisher,
    events: broadcast::Sender<WindowEvent>,
    dock_visible: AtomicBool,
}

impl HeadlessHost {
    /// `partitions` are the sessions created together with the main window.
    pub fn new(partitions: Vec<String>) -> Self {
        let (ready, _) = ready_channel();
        let (events, _) = broadcast::channel(64);

        Self {
            platform: Platform::current(),
            partitions,
            window: RwLock::new(None),
            sessions: DashMap::new(),
            ready,
            events,
            dock_visible: AtomicBool::new(true),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Creates the main window and its sessions, then publishes ready.
    /// Opening twice returns the existing window.
    pub fn open_window(&self, bounds: Bounds) -> Arc<HeadlessWindow> {
        if let Some(window) = self.window.read().as_ref() {
            return Arc::clone(window);
        }

        let window = Arc::new(HeadlessWindow::new(bounds, self.events.clone()));
        *self.window.write() = Some(Arc::clone(&window));

        for partition in &self.partitions {
            self.add_session(partition);
        }

        if self.ready.publish() {
            info!("Main window ready ({}), {} session(s)", bounds, self.sessions.len());
        }
        window
    }

    /// Destroys the main window and disposes every session.
    pub fn close_window(&self) {
        if let Some(window) = self.window.write().take() {
            window.alive.store(false, Ordering::SeqCst);
        }
        for entry in self.sessions.iter() {
            entry.value().dispose();
        }
        self.sessions.clear();
        info!("Main window closed");
    }

    pub fn add_session(&self, partition: &str) -> Arc<HeadlessSession> {
        self.sessions
            .entry(partition.to_string())
            .or_insert_with(|| {
                debug!("Session '{}' created", partition);
                Arc::new(HeadlessSession::new(partition))
            })
            .clone()
    }

    pub fn headless_window(&self) -> Option<Arc<HeadlessWindow>> {
        self.window.read().clone()
    }

    pub fn headless_session(&self, partition: &str) -> Option<Arc<HeadlessSession>> {
        self.sessions.get(partition).map(|entry| Arc::clone(entry.value()))
    }

    pub fn emit(&self, event: WindowEvent) {
        debug!("Window event: {}", event);
        // No receivers simply means nothing listens yet.
        let _ = self.events.send(event);
    }

    pub fn dock_visible(&self) -> bool {
        self.dock_visible.load(Ordering::SeqCst)
    }
}

impl Host for HeadlessHost {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn primary_window(&self) -> Option<Arc<dyn HostWindow>> {
        self.window
            .read()
            .as_ref()
            .map(|window| Arc::clone(window) as Arc<dyn HostWindow>)
    }

    fn session(&self, partition: &str) -> Option<Arc<dyn Session>> {
        self.headless_session(partition)
            .map(|session| session as Arc<dyn Session>)
    }

    fn sessions(&self) -> Vec<Arc<dyn Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn Session>)
            .collect()
    }

    fn ready(&self) -> ReadySignal {
        self.ready.signal()
    }

    fn window_events(&self) -> broadcast::Receiver<WindowEvent> {
        self.events.subscribe()
    }

    fn set_dock_visible(&self, visible: bool) {
        info!("Dock icon {}", if visible { "shown" } else { "hidden" });
        self.dock_visible.store(visible, Ordering::SeqCst);
    }
}

/// Observable state of a [`HeadlessWindow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    pub always_on_top: bool,
    pub skip_taskbar: bool,
    pub ignore_mouse_events: bool,
    pub has_shadow: bool,
    pub content_classes: BTreeSet<String>,
    pub bounds: Bounds,
    pub visible: bool,
}

pub struct HeadlessWindow {
    state: RwLock<WindowState>,
    alive: AtomicBool,
    events: broadcast::Sender<WindowEvent>,
}

impl HeadlessWindow {
    fn new(bounds: Bounds, events: broadcast::Sender<WindowEvent>) -> Self {
        Self {
            state: RwLock::new(WindowState {
                always_on_top: false,
                skip_taskbar: false,
                ignore_mouse_events: false,
                has_shadow: true,
                content_classes: BTreeSet::new(),
                bounds,
                visible: false,
            }),
            alive: AtomicBool::new(true),
            events,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state.read().clone()
    }

    /// The user dragged the window.
    pub fn user_move(&self, x: i32, y: i32) {
        let bounds = {
            let mut state = self.state.write();
            state.bounds.x = x;
            state.bounds.y = y;
            state.bounds
        };
        let _ = self.events.send(WindowEvent::moved(bounds));
    }

    /// The user resized the window.
    pub fn user_resize(&self, width: u32, height: u32) {
        let bounds = {
            let mut state = self.state.write();
            state.bounds.width = width;
            state.bounds.height = height;
            state.bounds
        };
        let _ = self.events.send(WindowEvent::resized(bounds));
    }

    fn set_visible(&self, visible: bool) {
        let changed = {
            let mut state = self.state.write();
            let changed = state.visible != visible;
            state.visible = visible;
            changed
        };
        if changed {
            let event = if visible {
                WindowEvent::shown()
            } else {
                WindowEvent::hidden()
            };
            let _ = self.events.send(event);
        }
    }
}

impl HostWindow for HeadlessWindow {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn set_always_on_top(&self, enabled: bool) {
        debug!("Window always-on-top: {}", enabled);
        self.state.write().always_on_top = enabled;
    }

    fn is_always_on_top(&self) -> bool {
        self.state.read().always_on_top
    }

    fn set_skip_taskbar(&self, skip: bool) {
        debug!("Window skip-taskbar: {}", skip);
        self.state.write().skip_taskbar = skip;
    }

    fn set_ignore_mouse_events(&self, ignore: bool) {
        self.state.write().ignore_mouse_events = ignore;
    }

    fn set_has_shadow(&self, shadow: bool) {
        self.state.write().has_shadow = shadow;
    }

    fn set_content_class(&self, class: &str, enabled: bool) {
        let mut state = self.state.write();
        if enabled {
            state.content_classes.insert(class.to_string());
        } else {
            state.content_classes.remove(class);
        }
    }

    fn set_bounds(&self, bounds: Bounds) {
        debug!("Window bounds: {}", bounds);
        self.state.write().bounds = bounds;
    }

    fn bounds(&self) -> Bounds {
        self.state.read().bounds
    }

    fn show(&self) {
        self.set_visible(true);
    }

    fn hide(&self) {
        self.set_visible(false);
    }

    fn is_visible(&self) -> bool {
        self.state.read().visible
    }
}

pub struct HeadlessSession {
    partition: String,
    alive: AtomicBool,
    interceptor: RwLock<Option<Arc<dyn RequestInterceptor>>>,
    installs: AtomicUsize,
    storage_clears: AtomicUsize,
}

impl HeadlessSession {
    fn new(partition: &str) -> Self {
        Self {
            partition: partition.to_string(),
            alive: AtomicBool::new(true),
            interceptor: RwLock::new(None),
            installs: AtomicUsize::new(0),
            storage_clears: AtomicUsize::new(0),
        }
    }

    pub fn dispose(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.interceptor.write().take();
    }

    /// Runs `request` through the installed interceptor.
    pub fn dispatch(&self, request: &RequestDetails) -> RequestDecision {
        // Clone out of the lock so the interceptor runs unlocked.
        let interceptor = self.interceptor.read().clone();
        match interceptor {
            Some(interceptor) => interceptor.on_before_request(request),
            None => RequestDecision::Proceed,
        }
    }

    pub fn fetch(&self, url: &str) -> RequestDecision {
        self.dispatch(&RequestDetails::new(url, self.partition.as_str()))
    }

    /// How many times an interceptor has been installed.
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn storage_clear_count(&self) -> usize {
        self.storage_clears.load(Ordering::SeqCst)
    }
}

impl Session for HeadlessSession {
    fn partition(&self) -> &str {
        &self.partition
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn set_interceptor(&self, interceptor: Option<Arc<dyn RequestInterceptor>>) -> Result<()> {
        if !self.is_alive() {
            return Err(ShellError::filter_registration(
                &self.partition,
                "session has been disposed",
            ));
        }

        if interceptor.is_some() {
            self.installs.fetch_add(1, Ordering::SeqCst);
        }
        *self.interceptor.write() = interceptor;
        Ok(())
    }

    fn has_interceptor(&self) -> bool {
        self.interceptor.read().is_some()
    }

    fn clear_storage(&self) -> Result<()> {
        if !self.is_alive() {
            return Err(crate::shell_error!(
                internal,
                "session '{}' has been disposed",
                self.partition
            ));
        }
        debug!("Session '{}' storage cleared", self.partition);
        self.storage_clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
