use crate::error::{Result, ShellError};
use smallvec::SmallVec;
use std::fmt;
use url::Url;

/// Case-sensitive glob where `*` matches any run of characters (including
/// none). There are no other metacharacters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob {
    source: String,
    // Literal pieces between the stars; `a*b*c` -> ["a", "b", "c"].
    parts: SmallVec<[String; 4]>,
}

impl Glob {
    pub fn new(pattern: &str) -> Self {
        Self {
            source: pattern.to_string(),
            parts: pattern.split('*').map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, text: &str) -> bool {
        let parts = &self.parts;
        if parts.len() == 1 {
            return text == parts[0];
        }

        let first = &parts[0];
        let last = &parts[parts.len() - 1];

        let Some(mut rest) = text.strip_prefix(first.as_str()) else {
            return false;
        };

        // Leftmost match for every inner piece is enough with only `*`.
        for part in &parts[1..parts.len() - 1] {
            if part.is_empty() {
                continue;
            }
            match rest.find(part.as_str()) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }

        rest.ends_with(last.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SchemeMatch {
    /// `*` covers the web schemes only.
    Web,
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostMatch {
    Any,
    /// `*.example.com`: the domain itself or any subdomain.
    Domain(String),
    Exact(String),
}

const WEB_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    Match {
        scheme: SchemeMatch,
        host: HostMatch,
        path: Glob,
    },
    Glob(Glob),
}

/// One blocklist entry.
///
/// `scheme://host/path` patterns match the scheme, host and path-plus-query
/// of the request separately, so `*://*.doubleclick.net/*` never matches
/// `https://example.com/doubleclick.net`. Anything else is a [`Glob`] over
/// the whole URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    source: String,
    kind: PatternKind,
}

impl UrlPattern {
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ShellError::invalid_pattern(source, "empty pattern"));
        }

        let Some((scheme, rest)) = source.split_once("://") else {
            return Ok(Self::glob(source));
        };

        let scheme = match scheme {
            "*" => SchemeMatch::Web,
            s if is_scheme_name(s) => SchemeMatch::Exact(s.to_ascii_lowercase()),
            // Not a match pattern, e.g. `*tracking*://`; treat as a plain glob.
            _ => return Ok(Self::glob(source)),
        };

        let Some(path_start) = rest.find('/') else {
            return Err(ShellError::invalid_pattern(source, "missing path"));
        };
        let (host, path) = rest.split_at(path_start);

        // Request hosts come lowercased from the URL parser.
        let host = host.to_ascii_lowercase();
        let host = match host.as_str() {
            "" => return Err(ShellError::invalid_pattern(source, "missing host")),
            "*" => HostMatch::Any,
            h => match h.strip_prefix("*.") {
                Some(domain) if !domain.is_empty() && !domain.contains('*') => {
                    HostMatch::Domain(domain.to_string())
                }
                Some(_) => return Err(ShellError::invalid_pattern(source, "invalid host wildcard")),
                None if h.contains('*') => {
                    return Err(ShellError::invalid_pattern(
                        source,
                        "'*' is only allowed as the whole host or a leading '*.'",
                    ))
                }
                None => HostMatch::Exact(h.to_string()),
            },
        };

        Ok(Self {
            source: source.to_string(),
            kind: PatternKind::Match {
                scheme,
                host,
                path: Glob::new(path),
            },
        })
    }

    fn glob(source: &str) -> Self {
        Self {
            source: source.to_string(),
            kind: PatternKind::Glob(Glob::new(source)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// `true` for `scheme://host/path` patterns, `false` for whole-URL globs.
    pub fn is_match_pattern(&self) -> bool {
        matches!(self.kind, PatternKind::Match { .. })
    }

    pub fn matches(&self, url: &str) -> bool {
        let parsed = if self.is_match_pattern() {
            Url::parse(url).ok()
        } else {
            None
        };
        self.matches_parsed(url, parsed.as_ref())
    }

    /// `parsed` is `url` already parsed by the caller, `None` if it did not parse.
    pub(crate) fn matches_parsed(&self, url: &str, parsed: Option<&Url>) -> bool {
        match &self.kind {
            PatternKind::Glob(glob) => glob.matches(url),
            PatternKind::Match { scheme, host, path } => {
                let Some(parsed) = parsed else {
                    return false;
                };

                let scheme_ok = match scheme {
                    SchemeMatch::Web => WEB_SCHEMES.contains(&parsed.scheme()),
                    SchemeMatch::Exact(s) => parsed.scheme() == s.as_str(),
                };
                if !scheme_ok {
                    return false;
                }

                let Some(request_host) = parsed.host_str() else {
                    return false;
                };
                let host_ok = match host {
                    HostMatch::Any => true,
                    HostMatch::Exact(h) => request_host == h.as_str(),
                    HostMatch::Domain(domain) => {
                        request_host == domain.as_str()
                            || request_host
                                .strip_suffix(domain.as_str())
                                .is_some_and(|sub| sub.ends_with('.'))
                    }
                };
                if !host_ok {
                    return false;
                }

                match parsed.query() {
                    Some(query) => path.matches(&format!("{}?{}", parsed.path(), query)),
                    None => path.matches(parsed.path()),
                }
            }
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_scheme_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_basics() {
        assert!(Glob::new("abc").matches("abc"));
        assert!(!Glob::new("abc").matches("abcd"));
        assert!(Glob::new("*").matches(""));
        assert!(Glob::new("a*c").matches("ac"));
        assert!(Glob::new("a*c").matches("abbbc"));
        assert!(!Glob::new("a*c").matches("abcd"));
        assert!(Glob::new("*b*d*").matches("abcde"));
        assert!(!Glob::new("ab*ba").matches("aba"));
        assert!(Glob::new("/csi*?*ad_at*").matches("/csi?v=3&ad_at=1"));
    }

    #[test]
    fn glob_is_case_sensitive() {
        assert!(!Glob::new("*Ads*").matches("https://example.com/ads"));
    }

    #[test]
    fn doubleclick_subdomain_matches() {
        let pattern = UrlPattern::parse("*://*.doubleclick.net/*").unwrap();
        assert!(pattern.matches("https://ads.doubleclick.net/x"));
        assert!(pattern.matches("https://ads.doubleclick.net/track"));
        assert!(pattern.matches("http://doubleclick.net/"));
        assert!(pattern.matches("wss://a.b.doubleclick.net/socket"));
    }

    #[test]
    fn doubleclick_in_path_does_not_match() {
        let pattern = UrlPattern::parse("*://*.doubleclick.net/*").unwrap();
        assert!(!pattern.matches("https://example.com/doubleclick.net"));
        assert!(!pattern.matches("https://notdoubleclick.net/x"));
        assert!(!pattern.matches("ftp://ads.doubleclick.net/x"));
        assert!(!pattern.matches("not a url"));
    }

    #[test]
    fn path_glob_covers_query() {
        let pattern = UrlPattern::parse("*://*.youtube.com/api/stats/ads*?*").unwrap();
        assert!(pattern.matches("https://www.youtube.com/api/stats/ads?ver=2&cpn=abc"));
        assert!(!pattern.matches("https://www.youtube.com/api/stats/ads"));
        assert!(!pattern.matches("https://www.youtube.com/api/stats/playback?ver=2"));
    }

    #[test]
    fn exact_host_and_scheme() {
        let pattern = UrlPattern::parse("https://csi.gstatic.com/csi?*video_to_ad*").unwrap();
        assert!(pattern.matches("https://csi.gstatic.com/csi?v=2&action=video_to_ad"));
        assert!(!pattern.matches("http://csi.gstatic.com/csi?v=2&action=video_to_ad"));
        assert!(!pattern.matches("https://www.csi.gstatic.com/csi?action=video_to_ad"));
    }

    #[test]
    fn host_matching_ignores_case() {
        let domain = UrlPattern::parse("*://*.DoubleClick.net/*").unwrap();
        assert!(domain.matches("https://ads.DoubleClick.net/x"));
        assert!(domain.matches("https://ads.doubleclick.net/x"));
        assert_eq!(domain.as_str(), "*://*.DoubleClick.net/*");

        let exact = UrlPattern::parse("https://CSI.gstatic.com/*").unwrap();
        assert!(exact.matches("https://csi.gstatic.com/csi"));
        assert!(exact.matches("https://CSI.GSTATIC.COM/csi"));
    }

    #[test]
    fn plain_glob_over_whole_url() {
        let pattern = UrlPattern::parse("*tracking*").unwrap();
        assert!(!pattern.is_match_pattern());
        assert!(pattern.matches("https://example.com/tracking/pixel.gif"));
        assert!(!pattern.matches("https://example.com/watch"));
    }

    #[test]
    fn invalid_patterns() {
        assert!(UrlPattern::parse("").is_err());
        assert!(UrlPattern::parse("*://*.example.com").is_err());
        assert!(UrlPattern::parse("*:///path").is_err());
        assert!(UrlPattern::parse("*://ex*ample.com/*").is_err());
        assert!(UrlPattern::parse("*://*.*/").is_err());
    }
}
