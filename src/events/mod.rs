pub mod request;
pub mod settings;
pub mod window;

pub use request::{RequestDecision, RequestDetails, ResourceType};
pub use settings::SettingChange;
pub use window::{Bounds, WindowEvent, WindowEventType};
