//! Request filter: cancels outbound requests whose URL matches a blocklist.
//!
//! [`pattern`] implements the URL pattern language, [`list`] groups patterns
//! into named lists (including the built-in ad/telemetry list) and [`filter`]
//! installs the list on host sessions.

pub mod filter;
pub mod list;
pub mod pattern;

pub use filter::{FilterInterceptor, RequestFilter};
pub use list::FilterList;
pub use pattern::{Glob, UrlPattern};
