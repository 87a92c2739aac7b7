use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of resource a request loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Script,
    Image,
    Media,
    Xhr,
    Other,
}

/// An outbound request as seen by a session before it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDetails {
    pub url: String,
    pub partition: String,
    pub resource_type: ResourceType,
}

impl RequestDetails {
    pub fn new(url: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            partition: partition.into(),
            resource_type: ResourceType::Other,
        }
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    /// URL shortened for log lines.
    pub fn short_url(&self) -> String {
        const MAX: usize = 100;
        if self.url.chars().count() <= MAX {
            return self.url.clone();
        }
        let head: String = self.url.chars().take(MAX - 3).collect();
        format!("{head}...")
    }
}

impl fmt::Display for RequestDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?} {}", self.partition, self.resource_type, self.short_url())
    }
}

/// What an interceptor decided for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestDecision {
    Proceed,
    Cancel,
}

impl RequestDecision {
    pub fn is_cancel(self) -> bool {
        matches!(self, RequestDecision::Cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_url_truncates() {
        let long = format!("https://example.com/{}", "a".repeat(200));
        let details = RequestDetails::new(long, "persist:player");
        let short = details.short_url();
        assert_eq!(short.chars().count(), 100);
        assert!(short.ends_with("..."));

        let details = RequestDetails::new("https://youtube.com/watch", "persist:player");
        assert_eq!(details.short_url(), "https://youtube.com/watch");
    }
}
