pub mod host;
pub mod request_filter;

pub use host::{HeadlessHost, Host, HostWindow, Platform, Session};
pub use request_filter::{FilterList, RequestFilter, UrlPattern};
