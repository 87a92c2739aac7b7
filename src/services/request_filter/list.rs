use crate::error::Result;
use once_cell::sync::Lazy;
use std::fmt;
use url::Url;

use super::pattern::UrlPattern;

/// YouTube/Google ad and telemetry endpoints blocked out of the box.
pub const BUILTIN_PATTERNS: [&str; 31] = [
    "*://*.doubleclick.net/*",
    "*://*.google.com/pagead*",
    "*://*.google.com/uds/api/ads/*",
    "*://*.googleadservices.com/pagead*",
    "*://*.googleapis.com/*log_interaction*?*",
    "*://*.googleapis.com/adsmeasurement*",
    "*://*.googleapis.com/plus*",
    "*://*.googleapis.com/youtubei/v1/player/ad_break?*",
    "*://*.googleusercontent.com/generate_204*",
    "*://*.gstatic.com/csi*?*ad_at*",
    "*://*.gstatic.com/csi*?*ad_to_video*",
    "*://*.gstatic.com/csi*?*mod_ad*",
    "*://*.gstatic.com/csi*?*yt_ad*",
    "*://*.youtube-nocookie.com/api/ads/trueview_redirect?*",
    "*://*.youtube-nocookie.com/gen_204*",
    "*://*.youtube.com/ad_data_204*",
    "*://*.youtube.com/api/stats/ads*?*",
    "*://*.youtube.com/api/stats/atr*?*",
    "*://*.youtube.com/api/stats/qoe*?*",
    "*://*.youtube.com/api/stats/watchtime*?*",
    "*://*.youtube.com/generate_204*",
    "*://*.youtube.com/gen_204*",
    "*://*.youtube.com/get_ad_tags?*",
    "*://*.youtube.com/player_204*",
    "*://*.youtube.com/ptracking?*",
    "*://*.youtube.com/set_awesome*",
    "*://*.youtube.com/stream_204*",
    "*://*.youtube.com/yva_video?*adformat*",
    "*://*.youtube.com/yva_video?*preroll*",
    "*://csi.gstatic.com/csi?*video_to_ad*",
    "*://manifest.googlevideo.com/generate_204*",
];

static BUILTIN: Lazy<FilterList> = Lazy::new(|| FilterList {
    name: "builtin".to_string(),
    patterns: BUILTIN_PATTERNS
        .iter()
        .filter_map(|source| UrlPattern::parse(source).ok())
        .collect(),
});

/// Ordered set of URL patterns. Two lists are equal when they hold the same
/// patterns in the same order; the name is only used for logging.
#[derive(Debug, Clone)]
pub struct FilterList {
    name: String,
    patterns: Vec<UrlPattern>,
}

impl FilterList {
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Parses every pattern, failing on the first invalid one.
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn parse<S: AsRef<str>>(name: &str, sources: &[S]) -> Result<Self> {
        let mut patterns: Vec<UrlPattern> = Vec::with_capacity(sources.len());
        for source in sources {
            let pattern = UrlPattern::parse(source.as_ref())?;
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }

        Ok(Self {
            name: name.to_string(),
            patterns,
        })
    }

    /// This list followed by the patterns of `other` it does not already hold.
    pub fn extended(&self, other: &FilterList) -> Self {
        let mut patterns = self.patterns.clone();
        for pattern in &other.patterns {
            if !patterns.contains(pattern) {
                patterns.push(pattern.clone());
            }
        }

        Self {
            name: format!("{}+{}", self.name, other.name),
            patterns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(UrlPattern::as_str)
    }

    pub fn matches(&self, url: &str) -> bool {
        self.first_match(url).is_some()
    }

    /// First pattern matching `url`, in list order.
    pub fn first_match(&self, url: &str) -> Option<&UrlPattern> {
        // Parse once for all match patterns.
        let parsed = Url::parse(url).ok();
        self.patterns
            .iter()
            .find(|pattern| pattern.matches_parsed(url, parsed.as_ref()))
    }
}

impl PartialEq for FilterList {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for FilterList {}

impl fmt::Display for FilterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} patterns)", self.name, self.patterns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_list_is_complete() {
        let list = FilterList::builtin();
        assert_eq!(list.len(), BUILTIN_PATTERNS.len());
        assert!(list.sources().eq(BUILTIN_PATTERNS.iter().copied()));
    }

    #[test]
    fn builtin_blocks_known_endpoints() {
        let list = FilterList::builtin();
        assert!(list.matches("https://ads.doubleclick.net/track"));
        assert!(list.matches("https://www.youtube.com/api/stats/ads?ver=2"));
        assert!(list.matches("https://www.youtube.com/ptracking?html5=1"));
        assert!(!list.matches("https://r4---sn.googlevideo.com/generate_204"));
        assert!(list.matches("https://manifest.googlevideo.com/generate_204?x=1"));

        assert!(!list.matches("https://youtube.com/watch"));
        assert!(!list.matches("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!list.matches("https://example.com/doubleclick.net"));
    }

    #[test]
    fn first_match_reports_pattern() {
        let list = FilterList::builtin();
        let hit = list
            .first_match("https://www.youtube.com/get_ad_tags?video_id=1")
            .unwrap();
        assert_eq!(hit.as_str(), "*://*.youtube.com/get_ad_tags?*");
    }

    #[test]
    fn parse_dedupes_and_propagates_errors() {
        let list = FilterList::parse("test", &["*a*", "*b*", "*a*"]).unwrap();
        assert_eq!(list.len(), 2);
        assert!(FilterList::parse("bad", &["*://*.x.com"]).is_err());
    }

    #[test]
    fn equality_ignores_name() {
        let a = FilterList::parse("a", &["*x*"]).unwrap();
        let b = FilterList::parse("b", &["*x*"]).unwrap();
        let c = FilterList::parse("a", &["*y*"]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn extended_appends_new_patterns_only() {
        let base = FilterList::parse("base", &["*a*", "*b*"]).unwrap();
        let extra = FilterList::parse("extra", &["*b*", "*c*"]).unwrap();
        let merged = base.extended(&extra);
        assert!(merged.sources().eq(["*a*", "*b*", "*c*"]));
        assert_eq!(merged.name(), "base+extra");
    }
}
