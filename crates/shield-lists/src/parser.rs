//! EasyList-subset parser
//!
//! Turns raw filter-list text into a compact [`FilterRuleSet`]: host
//! suffixes, literal substrings, compiled regexes, and exception
//! substrings. Cosmetic rules are out of scope and skipped. Malformed
//! individual rules are dropped without aborting the parse; the totals
//! expose how many lines each category absorbed.

use std::collections::HashSet;

use log::debug;
use regex::{Regex, RegexBuilder};

use shield_core::FilterRuleSet;

/// Per-category line counts from one parse, for diagnostics and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseTotals {
    pub host_suffixes: usize,
    pub substrings: usize,
    pub regexes: usize,
    pub exceptions: usize,
    /// Comments, cosmetic rules, and rules dropped as malformed.
    pub skipped: usize,
}

impl ParseTotals {
    pub fn rules(&self) -> usize {
        self.host_suffixes + self.substrings + self.regexes + self.exceptions
    }
}

/// Parse one or more list texts into a single ruleset.
pub fn parse_lists<S: AsRef<str>>(blobs: &[S]) -> (FilterRuleSet, ParseTotals) {
    let mut totals = ParseTotals::default();
    let mut host_suffixes: HashSet<String> = HashSet::new();
    let mut substrings: HashSet<String> = HashSet::new();
    let mut regexes: Vec<(String, Regex)> = Vec::new();
    let mut exceptions: Vec<String> = Vec::new();

    for blob in blobs {
        for raw_line in blob.as_ref().lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            // Comments.
            if line.starts_with('!') || line.starts_with('#') {
                totals.skipped += 1;
                continue;
            }

            // Exceptions: the remainder vetoes blocks as a substring.
            if let Some(rest) = line.strip_prefix("@@") {
                let rest = rest.trim();
                if rest.is_empty() {
                    totals.skipped += 1;
                } else {
                    exceptions.push(normalize_exception(rest));
                    totals.exceptions += 1;
                }
                continue;
            }

            // Cosmetic rules are out of scope.
            if line.contains("##") || line.contains("#@#") {
                totals.skipped += 1;
                continue;
            }

            // Domain-anchored rules.
            if let Some(rest) = line.strip_prefix("||") {
                match parse_domain_anchor(rest) {
                    Some(host) => {
                        host_suffixes.insert(host);
                        totals.host_suffixes += 1;
                    }
                    None => totals.skipped += 1,
                }
                continue;
            }

            // Anchored-prefix rules.
            if let Some(rest) = line.strip_prefix('|') {
                match translate_anchored_prefix(rest) {
                    Some(re) => {
                        regexes.push((line.to_string(), re));
                        totals.regexes += 1;
                    }
                    None => {
                        debug!("dropping unparseable anchored rule: {line}");
                        totals.skipped += 1;
                    }
                }
                continue;
            }

            // Wildcard/path rules.
            if line.contains('*') || line.contains('/') || line.contains('^') {
                match translate_wildcard(line) {
                    Some(re) => {
                        regexes.push((line.to_string(), re));
                        totals.regexes += 1;
                    }
                    None => {
                        debug!("dropping unparseable pattern rule: {line}");
                        totals.skipped += 1;
                    }
                }
                continue;
            }

            // Everything else is a literal substring.
            substrings.insert(line.to_ascii_lowercase());
            totals.substrings += 1;
        }
    }

    let mut substrings: Vec<String> = substrings.into_iter().collect();
    substrings.sort();

    let ruleset = FilterRuleSet::from_parts(host_suffixes, substrings, regexes, exceptions);
    (ruleset, totals)
}

/// `||domain^...` → lowercased host suffix. Returns None for anchor rules
/// that carry a path (those never map to a plain suffix).
fn parse_domain_anchor(rest: &str) -> Option<String> {
    let cut = rest
        .find(|c| matches!(c, '^' | '|' | '/' | '?' | ':'))
        .unwrap_or(rest.len());
    // A path component after the host disqualifies the suffix form.
    if rest[cut..].starts_with('/') || rest[cut..].starts_with('?') {
        return None;
    }

    let host = rest[..cut].trim_start_matches('.').to_ascii_lowercase();
    if host.is_empty()
        || !host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return None;
    }
    Some(host)
}

/// `@@` remainder → lowercase substring. Domain-anchor syntax inside the
/// exception is reduced to something that can occur in a URL.
fn normalize_exception(rest: &str) -> String {
    rest.trim_start_matches("||")
        .trim_end_matches(|c| c == '^' || c == '|')
        .to_ascii_lowercase()
}

/// `|prefix` → regex anchored at the start of the URL.
/// Dots are escaped and `*` becomes `.*`; everything else passes through,
/// so a rule with stray regex syntax fails to compile and is dropped.
pub fn translate_anchored_prefix(rest: &str) -> Option<Regex> {
    let mut pattern = String::with_capacity(rest.len() + 8);
    pattern.push('^');
    for c in rest.chars() {
        match c {
            '.' => pattern.push_str(r"\."),
            '*' => pattern.push_str(".*"),
            _ => pattern.push(c),
        }
    }
    RegexBuilder::new(&pattern).case_insensitive(true).build().ok()
}

/// Wildcard/path rule → regex. `^` is the ABP separator (end or any
/// character that is not alphanumeric, `_`, `.`, `%`, or `-`), `*` is a
/// wildcard, dots are literal.
pub fn translate_wildcard(rule: &str) -> Option<Regex> {
    let mut pattern = String::with_capacity(rule.len() + 16);
    for c in rule.chars() {
        match c {
            '^' => pattern.push_str(r"([^a-zA-Z0-9_.%-]|$)"),
            '*' => pattern.push_str(".*"),
            '.' => pattern.push_str(r"\."),
            _ => pattern.push(c),
        }
    }
    RegexBuilder::new(&pattern).case_insensitive(true).build().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_core::LocalMatch;

    // ---------------------------------------------------------------------
    // Domain anchor class
    // ---------------------------------------------------------------------

    #[test]
    fn domain_anchor_basic() {
        assert_eq!(parse_domain_anchor("ads.example.com^"), Some("ads.example.com".into()));
        assert_eq!(parse_domain_anchor("Ads.Example.com"), Some("ads.example.com".into()));
        assert_eq!(parse_domain_anchor(".example.com^"), Some("example.com".into()));
        assert_eq!(parse_domain_anchor("example.com^$third-party"), Some("example.com".into()));
    }

    #[test]
    fn domain_anchor_with_path_is_rejected() {
        assert_eq!(parse_domain_anchor("example.com/banner"), None);
        assert_eq!(parse_domain_anchor("example.com?x=1"), None);
    }

    #[test]
    fn domain_anchor_invalid_hosts_rejected() {
        assert_eq!(parse_domain_anchor(""), None);
        assert_eq!(parse_domain_anchor("^"), None);
        assert_eq!(parse_domain_anchor("exa mple.com"), None);
    }

    // ---------------------------------------------------------------------
    // Anchored prefix class
    // ---------------------------------------------------------------------

    #[test]
    fn anchored_prefix_matches_from_start() {
        let re = translate_anchored_prefix("https://ads.example.com/").unwrap();
        assert!(re.is_match("https://ads.example.com/banner.js"));
        assert!(!re.is_match("https://mirror.net/https://ads.example.com/"));
    }

    #[test]
    fn anchored_prefix_wildcard_and_case() {
        let re = translate_anchored_prefix("http*://cdn.example.com/ads/").unwrap();
        assert!(re.is_match("https://cdn.example.com/ads/x.gif"));
        assert!(re.is_match("HTTP://CDN.EXAMPLE.COM/ADS/x.gif"));
    }

    #[test]
    fn anchored_prefix_escapes_dots() {
        let re = translate_anchored_prefix("https://a.b/").unwrap();
        assert!(!re.is_match("https://aXb/"));
    }

    #[test]
    fn anchored_prefix_bad_syntax_drops() {
        assert!(translate_anchored_prefix("https://x.com/(").is_none());
    }

    // ---------------------------------------------------------------------
    // Wildcard class
    // ---------------------------------------------------------------------

    #[test]
    fn wildcard_star_spans_segments() {
        let re = translate_wildcard("/banners/*/ad").unwrap();
        assert!(re.is_match("https://e.com/banners/2024/fall/ad"));
        assert!(!re.is_match("https://e.com/banners/ad-less"));
    }

    #[test]
    fn wildcard_caret_is_separator() {
        let re = translate_wildcard("/ad^").unwrap();
        assert!(re.is_match("https://e.com/ad?x=1"));
        assert!(re.is_match("https://e.com/ad"));
        assert!(!re.is_match("https://e.com/address"));
    }

    #[test]
    fn wildcard_bad_syntax_drops() {
        assert!(translate_wildcard("/ads/(").is_none());
    }

    // ---------------------------------------------------------------------
    // Whole-parse behavior
    // ---------------------------------------------------------------------

    const SAMPLE: &str = "\
! Title: sample list
# another comment
||doubleclick.net^
||.tracker.example^
@@doubleclick.net
example.com##.ad-banner
adbanner
/adserver/*
|https://static.adhost.net/
||bad host^
";

    #[test]
    fn parse_categorizes_each_line() {
        let (_, totals) = parse_lists(&[SAMPLE]);
        assert_eq!(totals.host_suffixes, 2);
        assert_eq!(totals.exceptions, 1);
        assert_eq!(totals.substrings, 1);
        assert_eq!(totals.regexes, 2);
        // 2 comments + 1 cosmetic + 1 malformed domain anchor
        assert_eq!(totals.skipped, 4);
    }

    #[test]
    fn parse_is_idempotent() {
        let (_, a) = parse_lists(&[SAMPLE]);
        let (_, b) = parse_lists(&[SAMPLE]);
        assert_eq!(a, b);

        let (rs, _) = parse_lists(&[SAMPLE, SAMPLE]);
        // Duplicate host/substring rules collapse into the sets.
        assert_eq!(rs.host_suffix_count(), 2);
        assert_eq!(rs.substring_count(), 1);
    }

    #[test]
    fn parsed_set_blocks_domain_rule() {
        let (rs, _) = parse_lists(&["||doubleclick.net^\n"]);
        let m = rs.match_url("https://ad.doubleclick.net/x", "ad.doubleclick.net");
        assert_eq!(m, Some(LocalMatch::HostSuffix("doubleclick.net".into())));
    }

    #[test]
    fn parsed_exception_vetoes_block() {
        let (rs, _) = parse_lists(&["@@doubleclick.net\n||doubleclick.net^\n"]);
        assert_eq!(rs.match_url("https://x.doubleclick.net/", "x.doubleclick.net"), None);
    }

    #[test]
    fn malformed_rules_do_not_abort_parse() {
        let (rs, totals) = parse_lists(&["/ads/(\n||doubleclick.net^\n"]);
        assert_eq!(totals.skipped, 1);
        assert_eq!(rs.host_suffix_count(), 1);
    }

    #[test]
    fn blank_input_yields_empty_set() {
        let (rs, totals) = parse_lists(&["\n\n"]);
        assert!(rs.is_empty());
        assert_eq!(totals.rules(), 0);
    }
}
