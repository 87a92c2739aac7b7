//! The configuration items of the shell, in registration order.

use crate::error::Result;
use crate::events::{Bounds, WindowEvent, WindowEventType};
use crate::services::host::{HostWindow, Platform};
use crate::utils::paths;
use serde_json::{json, Value};

use super::r#trait::{ApplyTarget, ItemBehavior, ItemContext, Persistence};

/// Root element class toggled by `windowFloat`.
pub const FLOAT_CLASS: &str = "window-float";

pub fn default_items() -> Vec<Box<dyn ItemBehavior>> {
    vec![
        Box::new(Plain::new("internalVersion", json!(env!("CARGO_PKG_VERSION")))),
        Box::new(FilterAds),
        Box::new(Plain::new(
            "logFile",
            json!(paths::default_log_file().to_string_lossy()),
        )),
        Box::new(Plain::new("activeView", json!(""))),
        Box::new(Plain::new("playlistId", json!(""))),
        Box::new(Plain::new("playerType", json!("embed"))),
        Box::new(Plain::new("releaseNotes", json!(""))),
        Box::new(WindowAlwaysOnTop),
        Box::new(WindowInTrayOnly),
        Box::new(WindowFloat),
        Box::new(WindowBounds),
        Box::new(WindowVisible),
    ]
}

fn flag(value: &Value) -> Result<bool> {
    Ok(serde_json::from_value(value.clone())?)
}

/// Persisted value without a live effect.
pub struct Plain {
    key: &'static str,
    default: Value,
}

impl Plain {
    pub fn new(key: &'static str, default: Value) -> Self {
        Self { key, default }
    }
}

impl ItemBehavior for Plain {
    fn key(&self) -> &'static str {
        self.key
    }

    fn default_value(&self) -> Value {
        self.default.clone()
    }
}

/// Turns the request filter on or off for the configured partitions.
pub struct FilterAds;

impl ItemBehavior for FilterAds {
    fn key(&self) -> &'static str {
        "filterAds"
    }

    fn default_value(&self) -> Value {
        json!(true)
    }

    fn target(&self) -> ApplyTarget {
        ApplyTarget::Host
    }

    fn implements_on_init(&self) -> bool {
        true
    }

    fn implements_on_set(&self) -> bool {
        true
    }

    fn apply(&self, value: &Value, ctx: &ItemContext) -> Result<()> {
        if flag(value)? {
            ctx.filter.enable();
        } else {
            ctx.filter.disable();
        }
        Ok(())
    }
}

pub struct WindowAlwaysOnTop;

impl ItemBehavior for WindowAlwaysOnTop {
    fn key(&self) -> &'static str {
        "windowAlwaysOnTop"
    }

    fn default_value(&self) -> Value {
        json!(true)
    }

    fn target(&self) -> ApplyTarget {
        ApplyTarget::Host
    }

    fn implements_on_init(&self) -> bool {
        true
    }

    fn implements_on_set(&self) -> bool {
        true
    }

    fn apply(&self, value: &Value, ctx: &ItemContext) -> Result<()> {
        let enabled = flag(value)?;
        ctx.require_window(self.key())?.set_always_on_top(enabled);
        Ok(())
    }
}

/// Menu bar / tray only: hides the dock icon on macOS, the taskbar entry
/// elsewhere.
pub struct WindowInTrayOnly;

impl ItemBehavior for WindowInTrayOnly {
    fn key(&self) -> &'static str {
        "windowInTrayOnly"
    }

    fn default_value(&self) -> Value {
        json!(false)
    }

    fn target(&self) -> ApplyTarget {
        ApplyTarget::Host
    }

    fn implements_on_init(&self) -> bool {
        true
    }

    fn implements_on_set(&self) -> bool {
        true
    }

    fn apply(&self, value: &Value, ctx: &ItemContext) -> Result<()> {
        let enabled = flag(value)?;
        match ctx.host.platform() {
            Platform::MacOs => ctx.host.set_dock_visible(!enabled),
            Platform::Windows | Platform::Linux => {
                ctx.require_window(self.key())?.set_skip_taskbar(enabled)
            }
        }
        Ok(())
    }
}

/// Click-through overlay mode. Turning it off leaves always-on-top as is.
pub struct WindowFloat;

impl ItemBehavior for WindowFloat {
    fn key(&self) -> &'static str {
        "windowFloat"
    }

    fn default_value(&self) -> Value {
        json!(false)
    }

    fn target(&self) -> ApplyTarget {
        ApplyTarget::Host
    }

    fn implements_on_init(&self) -> bool {
        true
    }

    fn implements_on_set(&self) -> bool {
        true
    }

    fn apply(&self, value: &Value, ctx: &ItemContext) -> Result<()> {
        let enabled = flag(value)?;
        let window = ctx.require_window(self.key())?;

        window.set_content_class(FLOAT_CLASS, enabled);
        window.set_ignore_mouse_events(enabled);
        window.set_has_shadow(!enabled);
        if enabled {
            window.set_always_on_top(true);
        }
        Ok(())
    }
}

/// Position and size of the main window. Restored on init, recorded from
/// move/resize events and once more at quit.
pub struct WindowBounds;

impl ItemBehavior for WindowBounds {
    fn key(&self) -> &'static str {
        "windowBounds"
    }

    fn default_value(&self) -> Value {
        json!(Bounds::default())
    }

    fn persistence(&self) -> Persistence {
        Persistence::Debounced
    }

    fn target(&self) -> ApplyTarget {
        ApplyTarget::Host
    }

    fn implements_on_init(&self) -> bool {
        true
    }

    fn apply(&self, value: &Value, ctx: &ItemContext) -> Result<()> {
        let bounds: Bounds = serde_json::from_value(value.clone())?;
        ctx.require_window(self.key())?.set_bounds(bounds);
        Ok(())
    }

    fn listens_to_window(&self) -> bool {
        true
    }

    fn value_from_event(&self, event: &WindowEvent) -> Option<Value> {
        match event.event_type {
            WindowEventType::Moved | WindowEventType::Resized => event.bounds.map(|b| json!(b)),
            _ => None,
        }
    }

    fn capture_on_quit(&self, window: &dyn HostWindow) -> Option<Value> {
        Some(json!(window.bounds()))
    }
}

/// Whether the main window is shown. Restored on init, recorded from
/// show/hide events.
pub struct WindowVisible;

impl ItemBehavior for WindowVisible {
    fn key(&self) -> &'static str {
        "windowVisible"
    }

    fn default_value(&self) -> Value {
        json!(true)
    }

    fn persistence(&self) -> Persistence {
        Persistence::Debounced
    }

    fn target(&self) -> ApplyTarget {
        ApplyTarget::Host
    }

    fn implements_on_init(&self) -> bool {
        true
    }

    fn apply(&self, value: &Value, ctx: &ItemContext) -> Result<()> {
        let window = ctx.require_window(self.key())?;
        if flag(value)? {
            window.show();
        } else {
            window.hide();
        }
        Ok(())
    }

    fn listens_to_window(&self) -> bool {
        true
    }

    fn value_from_event(&self, event: &WindowEvent) -> Option<Value> {
        match event.event_type {
            WindowEventType::Shown => Some(json!(true)),
            WindowEventType::Hidden => Some(json!(false)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_order_and_defaults() {
        let items = default_items();
        let keys: Vec<&str> = items.iter().map(|item| item.key()).collect();
        assert_eq!(
            keys,
            vec![
                "internalVersion",
                "filterAds",
                "logFile",
                "activeView",
                "playlistId",
                "playerType",
                "releaseNotes",
                "windowAlwaysOnTop",
                "windowInTrayOnly",
                "windowFloat",
                "windowBounds",
                "windowVisible",
            ]
        );

        assert_eq!(items[0].default_value(), json!(env!("CARGO_PKG_VERSION")));
        assert_eq!(items[5].default_value(), json!("embed"));
        assert_eq!(
            items[10].default_value(),
            json!({"x": 100, "y": 200, "width": 1280, "height": 720})
        );
    }

    #[test]
    fn only_window_geometry_is_debounced() {
        let debounced: Vec<&str> = default_items()
            .iter()
            .filter(|item| item.persistence() == Persistence::Debounced)
            .map(|item| item.key())
            .collect();
        assert_eq!(debounced, vec!["windowBounds", "windowVisible"]);
    }

    #[test]
    fn window_events_map_to_values() {
        let bounds = Bounds::new(1, 2, 300, 400);
        assert_eq!(
            WindowBounds.value_from_event(&WindowEvent::moved(bounds)),
            Some(json!(bounds))
        );
        assert_eq!(WindowBounds.value_from_event(&WindowEvent::shown()), None);
        assert_eq!(WindowVisible.value_from_event(&WindowEvent::hidden()), Some(json!(false)));
        assert_eq!(
            WindowVisible.value_from_event(&WindowEvent::resized(bounds)),
            None
        );
    }
}
