use serde::{Deserialize, Serialize};
use std::fmt;

/// Window position and size, persisted as `windowBounds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(100, 200, 1280, 720)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Something that happened to the main window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEvent {
    pub event_type: WindowEventType,
    /// Window bounds at the time of the event, when the host knows them.
    pub bounds: Option<Bounds>,
    pub timestamp: std::time::Instant,
}

impl WindowEvent {
    pub fn new(event_type: WindowEventType, bounds: Option<Bounds>) -> Self {
        Self {
            event_type,
            bounds,
            timestamp: std::time::Instant::now(),
        }
    }

    pub fn shown() -> Self {
        Self::new(WindowEventType::Shown, None)
    }

    pub fn hidden() -> Self {
        Self::new(WindowEventType::Hidden, None)
    }

    pub fn moved(bounds: Bounds) -> Self {
        Self::new(WindowEventType::Moved, Some(bounds))
    }

    pub fn resized(bounds: Bounds) -> Self {
        Self::new(WindowEventType::Resized, Some(bounds))
    }

    pub fn before_quit(bounds: Option<Bounds>) -> Self {
        Self::new(WindowEventType::BeforeQuit, bounds)
    }
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds {
            Some(bounds) => write!(f, "{:?} ({})", self.event_type, bounds),
            None => write!(f, "{:?}", self.event_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowEventType {
    Shown,
    Hidden,
    Moved,
    Resized,
    BeforeQuit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let bounds = Bounds::default();
        assert_eq!(bounds, Bounds::new(100, 200, 1280, 720));
        assert_eq!(bounds.to_string(), "1280x720+100+200");
    }

    #[test]
    fn test_bounds_json_shape() {
        let value = serde_json::to_value(Bounds::new(1, 2, 3, 4)).unwrap();
        assert_eq!(value, serde_json::json!({"x": 1, "y": 2, "width": 3, "height": 4}));
    }

    #[test]
    fn test_window_event_creation() {
        let event = WindowEvent::moved(Bounds::new(5, 5, 640, 480));
        assert_eq!(event.event_type, WindowEventType::Moved);
        assert_eq!(event.bounds, Some(Bounds::new(5, 5, 640, 480)));
        assert_eq!(WindowEvent::hidden().bounds, None);
    }
}
