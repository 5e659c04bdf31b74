//! User-agent normalization.
//!
//! The pipeline never interprets raw user-agent strings itself; it
//! consumes the output of a [`UserAgentNormalizer`], which collapses a UA
//! string into an OS family and a browser family. Swapping the
//! implementation (keyword heuristic, library-backed parser) must not
//! change the column contract: the labeled files always carry the
//! rendered `os_browser` signature in the user-agent column.
//!
//! # Example
//!
//! ```
//! use ipinyou_data::ua::{KeywordNormalizer, UserAgentNormalizer};
//!
//! let normalizer = KeywordNormalizer::new();
//! let sig = normalizer.normalize("Mozilla/5.0 (Windows NT 6.1) Chrome/21.0");
//! assert_eq!(sig.signature(), "windows_chrome");
//!
//! let sig = normalizer.normalize("some unknown agent");
//! assert_eq!(sig.signature(), "other_other");
//! ```

/// Ordered OS keywords; the first substring match wins.
pub const OS_KEYWORDS: [&str; 5] = ["windows", "ios", "mac", "android", "linux"];

/// Ordered browser keywords; the first substring match wins.
pub const BROWSER_KEYWORDS: [&str; 8] = [
    "chrome", "sogou", "maxthon", "safari", "firefox", "theworld", "opera", "ie",
];

/// Fallback family when no keyword matches.
pub const OTHER: &str = "other";

/// A normalized user-agent: OS family and browser family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UaSignature {
    /// Detected OS family, or `other`.
    pub os_family: String,
    /// Detected browser family, or `other`.
    pub browser_family: String,
}

impl UaSignature {
    /// The `os_browser` rendering carried in the user-agent column.
    pub fn signature(&self) -> String {
        format!("{}_{}", self.os_family, self.browser_family)
    }
}

/// A pure function from raw user-agent string to [`UaSignature`].
///
/// Implementations must be deterministic: the feature index depends on
/// the normalized values being identical across runs.
pub trait UserAgentNormalizer: Send + Sync {
    /// Normalizes one raw user-agent string.
    fn normalize(&self, raw: &str) -> UaSignature;
}

impl<N: UserAgentNormalizer + ?Sized> UserAgentNormalizer for &N {
    fn normalize(&self, raw: &str) -> UaSignature {
        (**self).normalize(raw)
    }
}

/// The keyword-list normalizer used by the iPinYou benchmark.
///
/// Matches lowercase substrings against fixed, ordered OS and browser
/// keyword lists. Note the ordering subtleties are deliberate: `mac`
/// comes after `ios` so iPhones do not register as Macs, and `ie`
/// trails everything because it matches as a substring of many tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordNormalizer;

impl KeywordNormalizer {
    /// Creates the default keyword normalizer.
    pub fn new() -> Self {
        Self
    }

    fn detect(haystack: &str, candidates: &[&str]) -> String {
        for candidate in candidates {
            if haystack.contains(candidate) {
                return (*candidate).to_string();
            }
        }
        OTHER.to_string()
    }
}

impl UserAgentNormalizer for KeywordNormalizer {
    fn normalize(&self, raw: &str) -> UaSignature {
        let lowered = raw.to_lowercase();
        UaSignature {
            os_family: Self::detect(&lowered, &OS_KEYWORDS),
            browser_family: Self::detect(&lowered, &BROWSER_KEYWORDS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_combinations() {
        let n = KeywordNormalizer::new();
        assert_eq!(
            n.normalize("Mozilla/5.0 (Windows NT 5.1) Sogou/2.0").signature(),
            "windows_sogou"
        );
        assert_eq!(
            n.normalize("Mozilla/5.0 (Linux; Android 4.0) Safari/534").signature(),
            "android_safari"
        );
    }

    #[test]
    fn test_first_match_wins() {
        let n = KeywordNormalizer::new();
        // Chrome UAs also contain "safari"; chrome is listed first.
        let sig = n.normalize("Mozilla/5.0 (Macintosh) Chrome/21.0 Safari/537");
        assert_eq!(sig.browser_family, "chrome");
        assert_eq!(sig.os_family, "mac");
    }

    #[test]
    fn test_no_match_falls_back_to_other() {
        let n = KeywordNormalizer::new();
        assert_eq!(n.normalize("").signature(), "other_other");
        assert_eq!(n.normalize("curl/7.29.0").signature(), "other_other");
    }

    #[test]
    fn test_idempotent_on_own_output() {
        // Labeled files already carry signatures; re-normalizing one must
        // reproduce it unchanged.
        let n = KeywordNormalizer::new();
        assert_eq!(n.normalize("windows_chrome").signature(), "windows_chrome");
        assert_eq!(n.normalize("other_other").signature(), "other_other");
    }
}
