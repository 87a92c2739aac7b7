//! Tray menu: responsibility and boundaries
//!
//! Describes the tray menu as plain data bound to registry state and
//! interprets clicks on it. Drawing the menu and owning the tray icon are
//! left to the host.

mod menu;

pub use self::menu::{build_tray_menu, handle_click, handle_icon_click, MenuEntry, MenuId, MenuOutcome, PRODUCT_NAME};
