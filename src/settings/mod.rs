//! Settings store: responsibility and boundaries
//!
//! Persists the settings document and notifies subscribers of committed
//! changes. It knows nothing about which keys exist; the registry decides
//! that.

pub mod json_store;
pub mod keypath;
pub mod store;

pub use json_store::JsonFileStore;
pub use store::{create_settings_store, SettingsStore};
