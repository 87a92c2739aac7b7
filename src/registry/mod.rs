//! Configuration item registry: responsibility and boundaries
//!
//! Maps every named setting to its default, its persistence policy and its
//! live effect on the host. Reads and writes go through the injected
//! [`SettingsStore`](crate::settings::SettingsStore); live effects go through
//! the [`Host`](crate::services::host::Host) traits and the request filter.
//! The registry never creates windows or sessions itself.

mod item;
pub mod items;
mod registry;
mod r#trait;

pub use self::item::{ConfigurationItem, Implementation};
pub use self::items::{default_items, FLOAT_CLASS};
pub use self::registry::{InitReport, Registry};
pub use self::r#trait::{ApplyTarget, ItemBehavior, ItemContext, Persistence};
