//! Tag filters.
//!
//! Templates write filters in a JavaScript-flavoured dialect where `(?i)`
//! may appear anywhere in the pattern. The marker is removed and turned into
//! a case-insensitive build flag. Candidate tags lose their emoji before
//! matching; flag emoji are additionally tried as their two ASCII letters so
//! `(?i)US` finds `🇺🇸 Los Angeles`.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::error::FilterError;

const CASE_INSENSITIVE_MARKER: &str = "(?i)";

static PICTOGRAPHS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Extended_Pictographic}").expect("Invalid regex pattern"));

const REGIONAL_INDICATOR_A: u32 = 0x1F1E6;
const REGIONAL_INDICATOR_Z: u32 = 0x1F1FF;

/// A compiled tag filter.
#[derive(Debug, Clone)]
pub struct TagFilter {
    pattern: String,
    regex: Regex,
}

impl TagFilter {
    /// Compiles a filter pattern.
    pub fn compile(pattern: &str) -> Result<Self, FilterError> {
        if pattern.is_empty() {
            return Err(FilterError {
                pattern: String::new(),
                message: "empty pattern".to_string(),
            });
        }

        let case_insensitive = pattern.contains(CASE_INSENSITIVE_MARKER);
        let stripped = pattern.replace(CASE_INSENSITIVE_MARKER, "");

        let regex = RegexBuilder::new(&stripped)
            .case_insensitive(case_insensitive)
            .unicode(true)
            .build()
            .map_err(|e| FilterError {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Tests a tag with its pictographs removed.
    pub fn is_match(&self, tag: &str) -> bool {
        let cleaned = strip_pictographs(tag);
        if self.regex.is_match(&cleaned) {
            return true;
        }
        let transliterated = transliterate_flags(&cleaned);
        transliterated != cleaned && self.regex.is_match(&transliterated)
    }
}

/// Removes `Extended_Pictographic` code points and trims.
pub fn strip_pictographs(tag: &str) -> String {
    PICTOGRAPHS.replace_all(tag, "").trim().to_string()
}

/// Rewrites regional-indicator symbols as the ASCII letters they stand for.
fn transliterate_flags(text: &str) -> String {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if (REGIONAL_INDICATOR_A..=REGIONAL_INDICATOR_Z).contains(&code) {
                char::from(b'A' + (code - REGIONAL_INDICATOR_A) as u8)
            } else {
                c
            }
        })
        .collect()
}

/// Returns true for a regional-indicator symbol.
pub fn is_regional_indicator(c: char) -> bool {
    (REGIONAL_INDICATOR_A..=REGIONAL_INDICATOR_Z).contains(&(c as u32))
}

/// Checks that a pattern compiles.
pub fn validate(pattern: &str) -> Result<(), FilterError> {
    TagFilter::compile(pattern).map(|_| ())
}

/// Keeps the tags matching `pattern`.
///
/// An uncompilable pattern keeps nothing.
pub fn filter_tags<'a, I>(tags: I, pattern: &str) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    match TagFilter::compile(pattern) {
        Ok(filter) => tags.into_iter().filter(|t| filter.is_match(t)).collect(),
        Err(e) => {
            warn!(error = %e, "filter does not compile, matching nothing");
            Vec::new()
        }
    }
}

/// Compiles a list of patterns, dropping the ones that fail.
pub fn compile_all<'a, I>(patterns: I) -> Vec<TagFilter>
where
    I: IntoIterator<Item = &'a str>,
{
    patterns
        .into_iter()
        .filter_map(|pattern| match TagFilter::compile(pattern) {
            Ok(filter) => Some(filter),
            Err(e) => {
                warn!(error = %e, "ignoring filter");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_marker_with_flags() {
        let filter = TagFilter::compile("(?i)US").unwrap();
        assert!(filter.is_match("🇺🇸 Los Angeles"));
        assert!(!filter.is_match("🇯🇵 Tokyo"));
        assert!(filter.is_match("us-west"));
    }

    #[test]
    fn test_marker_anywhere_in_pattern() {
        let filter = TagFilter::compile("香港|(?i)hk|hong kong").unwrap();
        assert!(filter.is_match("HK 01"));
        assert!(filter.is_match("Hong Kong 02"));
        assert!(filter.is_match("🇭🇰 香港 IPLC"));
        assert!(!filter.is_match("Singapore"));
    }

    #[test]
    fn test_case_sensitive_without_marker() {
        let filter = TagFilter::compile("JP").unwrap();
        assert!(filter.is_match("JP 01"));
        assert!(!filter.is_match("jp 01"));
    }

    #[test]
    fn test_pictographs_are_stripped() {
        assert_eq!(strip_pictographs("🚀 Fast ⚡"), "Fast");
        let filter = TagFilter::compile("^Fast$").unwrap();
        assert!(filter.is_match("🚀 Fast ⚡"));
    }

    #[test]
    fn test_invalid_pattern_is_structured_error() {
        let err = TagFilter::compile("(?i)(unclosed").unwrap_err();
        assert_eq!(err.pattern, "(?i)(unclosed");
        assert!(!err.message.is_empty());
        assert!(validate("[").is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn test_filter_tags_fails_closed() {
        let tags = ["HK 01", "JP 01"];
        assert!(filter_tags(tags, "(").is_empty());
        assert_eq!(filter_tags(tags, "HK"), vec!["HK 01"]);
    }

    #[test]
    fn test_compile_all_skips_bad_patterns() {
        let filters = compile_all(["HK", "(", "(?i)jp"]);
        let patterns: Vec<_> = filters.iter().map(TagFilter::pattern).collect();
        assert_eq!(patterns, vec!["HK", "(?i)jp"]);
    }

    #[test]
    fn test_regional_indicator_detection() {
        let flag: Vec<char> = "🇺🇸".chars().collect();
        assert!(flag.iter().all(|c| is_regional_indicator(*c)));
        assert!(!is_regional_indicator('U'));
    }
}
