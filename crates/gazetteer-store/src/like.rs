//! SQL `LIKE` patterns.
//!
//! `%` matches any run of characters, `_` matches one character and `\` escapes the next
//! character. Matching is anchored at both ends.

use regex::Regex;

/// Translate a `LIKE` pattern into an unanchored regex body.
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(next.encode_utf8(&mut [0; 4])));
                } else {
                    out.push_str(&regex::escape("\\"));
                }
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out
}

/// Regex source equivalent to `pattern`, anchored at both ends.
pub fn to_regex(pattern: &str, case_insensitive: bool) -> String {
    let flags = if case_insensitive { "(?is)" } else { "(?s)" };
    format!("{flags}^{}$", translate(pattern))
}

/// Regex source matching any of `patterns`.
pub fn any_to_regex<S: AsRef<str>>(patterns: &[S], case_insensitive: bool) -> String {
    let flags = if case_insensitive { "(?is)" } else { "(?s)" };
    let alternatives = patterns
        .iter()
        .map(|p| translate(p.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    format!("{flags}^(?:{alternatives})$")
}

/// A `LIKE` pattern, checked by compiling it once.
#[derive(Debug, Clone)]
pub struct LikePattern {
    regex: Regex,
}

impl LikePattern {
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&to_regex(pattern, case_insensitive))?,
        })
    }

    /// Regex source for engines that compile patterns themselves, such as polars.
    pub fn regex_source(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        let p = LikePattern::new("Ii%", true).unwrap();
        assert!(p.is_match("Ii"));
        assert!(p.is_match("Iisalmi"));
        assert!(p.is_match("iitti"));
        assert!(!p.is_match("Kii"));

        let p = LikePattern::new("K_mi", false).unwrap();
        assert!(p.is_match("Kemi"));
        assert!(!p.is_match("kemi"));
        assert!(!p.is_match("Keemi"));
    }

    #[test]
    fn test_literal_pattern_is_anchored() {
        let p = LikePattern::new("Helsinki", true).unwrap();
        assert!(p.is_match("HELSINKI"));
        assert!(!p.is_match("Helsinki-Vantaa"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = LikePattern::new("St. John (city)", true).unwrap();
        assert!(p.is_match("st. john (city)"));
        assert!(!p.is_match("StX John (city)"));
    }

    #[test]
    fn test_escaped_wildcards() {
        let p = LikePattern::new("100\\%", false).unwrap();
        assert!(p.is_match("100%"));
        assert!(!p.is_match("1000"));
    }

    #[test]
    fn test_regex_source_matches_translation() {
        let p = LikePattern::new("Ii%", true).unwrap();
        assert_eq!(p.regex_source(), to_regex("Ii%", true));
    }

    #[test]
    fn test_any_to_regex() {
        let re = Regex::new(&any_to_regex(&["sv", "swe"], false)).unwrap();
        assert!(re.is_match("sv"));
        assert!(re.is_match("swe"));
        assert!(!re.is_match("sve"));

        let all = Regex::new(&any_to_regex(&["%"], false)).unwrap();
        assert!(all.is_match("fi"));
        assert!(all.is_match(""));
    }
}
