pub mod debounce;
pub mod paths;
pub mod ready;

pub use debounce::{DebounceSink, Debouncer};
pub use ready::{ready_channel, ReadyPublisher, ReadySignal};

#[macro_export]
macro_rules! debug_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! trace_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!($($arg)*);
        }
    };
}
