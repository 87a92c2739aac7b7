use crate::error::Result;
use crate::registry::Registry;
use crate::services::host::{Host, Platform};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

pub const PRODUCT_NAME: &str = "TubeShell";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuId {
    ShowWindow,
    Version,
    FilterAds,
    ChangePlaylist,
    WindowAlwaysOnTop,
    WindowInTrayOnly,
    WindowFloat,
    Quit,
}

impl MenuId {
    /// Configuration item a checkbox entry is bound to.
    pub fn setting_key(self) -> Option<&'static str> {
        match self {
            MenuId::FilterAds => Some("filterAds"),
            MenuId::WindowAlwaysOnTop => Some("windowAlwaysOnTop"),
            MenuId::WindowInTrayOnly => Some("windowInTrayOnly"),
            MenuId::WindowFloat => Some("windowFloat"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Action {
        id: MenuId,
        label: String,
        enabled: bool,
    },
    Checkbox {
        id: MenuId,
        label: String,
        checked: bool,
    },
    Separator,
}

impl MenuEntry {
    fn action(id: MenuId, label: impl Into<String>) -> Self {
        MenuEntry::Action {
            id,
            label: label.into(),
            enabled: true,
        }
    }

    pub fn id(&self) -> Option<MenuId> {
        match self {
            MenuEntry::Action { id, .. } | MenuEntry::Checkbox { id, .. } => Some(*id),
            MenuEntry::Separator => None,
        }
    }

    pub fn is_checked(&self) -> bool {
        matches!(self, MenuEntry::Checkbox { checked: true, .. })
    }
}

impl fmt::Display for MenuEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuEntry::Action { label, enabled, .. } => {
                if *enabled {
                    write!(f, "    {}", label)
                } else {
                    write!(f, "    ({})", label)
                }
            }
            MenuEntry::Checkbox { label, checked, .. } => {
                write!(f, "[{}] {}", if *checked { "x" } else { " " }, label)
            }
            MenuEntry::Separator => write!(f, "----"),
        }
    }
}

/// What the caller should do after a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    /// A setting changed; rebuild the menu so checkmarks follow it.
    Rebuild,
    ShowWindow,
    Quit,
    /// Settings were wiped; restart the application.
    Relaunch,
    Ignored,
}

/// Builds the tray menu. Checkbox states are read from the registry on every
/// call.
pub async fn build_tray_menu(registry: &Registry, platform: Platform) -> Vec<MenuEntry> {
    let tray_only_label = match platform {
        Platform::MacOs => "Hide Dock Icon",
        Platform::Windows | Platform::Linux => "Minimize to Tray",
    };

    vec![
        MenuEntry::action(MenuId::ShowWindow, format!("Show {}", PRODUCT_NAME)),
        MenuEntry::Action {
            id: MenuId::Version,
            label: format!("Version {}", env!("CARGO_PKG_VERSION")),
            enabled: false,
        },
        MenuEntry::Separator,
        checkbox(registry, MenuId::FilterAds, "YouTube AdBlock").await,
        MenuEntry::action(MenuId::ChangePlaylist, "Change YouTube Playlist..."),
        MenuEntry::Separator,
        checkbox(registry, MenuId::WindowAlwaysOnTop, "Always on Top").await,
        checkbox(registry, MenuId::WindowInTrayOnly, tray_only_label).await,
        checkbox(registry, MenuId::WindowFloat, "FloatMode").await,
        MenuEntry::Separator,
        MenuEntry::action(MenuId::Quit, format!("Quit {}", PRODUCT_NAME)),
    ]
}

async fn checkbox(registry: &Registry, id: MenuId, label: &str) -> MenuEntry {
    let checked = match id.setting_key().and_then(|key| registry.get_item(key)) {
        Some(item) => item.get().await.as_bool().unwrap_or(false),
        None => false,
    };

    MenuEntry::Checkbox {
        id,
        label: label.to_string(),
        checked,
    }
}

/// Handles a click on entry `id`. `checked` is the checkbox state after the
/// click and is ignored for plain actions.
pub async fn handle_click(
    registry: &Registry,
    host: &dyn Host,
    id: MenuId,
    checked: bool,
) -> Result<MenuOutcome> {
    debug!("Tray click: {:?} (checked: {})", id, checked);

    match id {
        MenuId::ShowWindow => {
            if let Some(window) = host.primary_window().filter(|w| w.is_alive()) {
                window.show();
            }
            Ok(MenuOutcome::ShowWindow)
        }
        MenuId::Version => Ok(MenuOutcome::Ignored),
        MenuId::FilterAds | MenuId::WindowAlwaysOnTop | MenuId::WindowInTrayOnly => {
            set_flag(registry, id, checked).await?;
            Ok(MenuOutcome::Rebuild)
        }
        MenuId::WindowFloat => {
            set_flag(registry, id, checked).await?;
            // Floating implies always-on-top; keep that checkbox in step.
            if checked {
                set_flag(registry, MenuId::WindowAlwaysOnTop, true).await?;
            }
            Ok(MenuOutcome::Rebuild)
        }
        MenuId::ChangePlaylist => {
            for session in host.sessions() {
                if let Err(e) = session.clear_storage() {
                    warn!("Failed to clear session '{}': {}", session.partition(), e);
                }
            }
            registry.reset().await?;
            info!("Settings reset, relaunching");
            Ok(MenuOutcome::Relaunch)
        }
        MenuId::Quit => Ok(MenuOutcome::Quit),
    }
}

async fn set_flag(registry: &Registry, id: MenuId, checked: bool) -> Result<()> {
    let Some(item) = id.setting_key().and_then(|key| registry.get_item(key)) else {
        warn!("Tray entry {:?} has no configuration item", id);
        return Ok(());
    };
    item.set(Value::from(checked)).await?;
    Ok(())
}

/// Left click on the tray icon: toggles the main window on Windows, does
/// nothing elsewhere. Returns whether the window changed.
pub fn handle_icon_click(host: &dyn Host) -> bool {
    if host.platform() != Platform::Windows {
        return false;
    }
    let Some(window) = host.primary_window().filter(|w| w.is_alive()) else {
        return false;
    };

    if window.is_visible() {
        window.hide();
    } else {
        window.show();
    }
    true
}
