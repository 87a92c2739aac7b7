//! Host service: responsibility and boundaries
//!
//! The host owns the native window, its web sessions and the dock. This module
//! only describes what the settings registry and the request filter need from
//! it. Window creation, menus, webview content and IPC stay on the host side.

mod headless;
mod r#trait;

pub use self::headless::{HeadlessHost, HeadlessSession, HeadlessWindow, WindowState};
pub use self::r#trait::{Host, HostWindow, Platform, RequestInterceptor, Session};
