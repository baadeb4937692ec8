//! Immutable filter ruleset built from parsed list text
//!
//! A `FilterRuleSet` is constructed once (at startup or on refresh) and
//! swapped in wholesale; `decide()` only ever reads a snapshot reference.
//! Match priority inside the set: exceptions veto first, then host
//! suffixes, then literal substrings, then regexes.

use std::collections::HashSet;

use aho_corasick::AhoCorasick;
use log::debug;
use regex::Regex;

use crate::url::walk_suffixes;

/// How a URL matched the local ruleset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalMatch {
    /// Request host equals or is a subdomain of a `||domain^` rule.
    HostSuffix(String),
    /// A literal substring rule occurs in the URL.
    Substring(String),
    /// A compiled wildcard/anchor rule matched.
    Pattern(String),
}

impl LocalMatch {
    /// The rule text that matched, for diagnostics.
    pub fn rule(&self) -> &str {
        match self {
            Self::HostSuffix(s) | Self::Substring(s) | Self::Pattern(s) => s,
        }
    }

    pub fn is_host_suffix(&self) -> bool {
        matches!(self, Self::HostSuffix(_))
    }
}

/// Compact matchable form of one or more filter lists.
pub struct FilterRuleSet {
    host_suffixes: HashSet<String>,
    substrings: Vec<String>,
    /// Automaton over `substrings`; None if construction failed, in which
    /// case matching falls back to a linear scan.
    substring_ac: Option<AhoCorasick>,
    regexes: Vec<(String, Regex)>,
    exceptions: Vec<String>,
}

impl FilterRuleSet {
    /// Build from parsed parts. Substrings and exceptions are expected
    /// lowercased; regexes carry their originating rule text.
    pub fn from_parts(
        host_suffixes: HashSet<String>,
        substrings: Vec<String>,
        regexes: Vec<(String, Regex)>,
        exceptions: Vec<String>,
    ) -> Self {
        let substring_ac = if substrings.is_empty() {
            None
        } else {
            match AhoCorasick::new(&substrings) {
                Ok(ac) => Some(ac),
                Err(e) => {
                    debug!("substring automaton build failed, using linear scan: {e}");
                    None
                }
            }
        };

        Self {
            host_suffixes,
            substrings,
            substring_ac,
            regexes,
            exceptions,
        }
    }

    /// An empty set that matches nothing. Used until the first list build
    /// completes and whenever all list sources fail.
    pub fn empty() -> Self {
        Self::from_parts(HashSet::new(), Vec::new(), Vec::new(), Vec::new())
    }

    pub fn host_suffix_count(&self) -> usize {
        self.host_suffixes.len()
    }

    pub fn substring_count(&self) -> usize {
        self.substrings.len()
    }

    pub fn regex_count(&self) -> usize {
        self.regexes.len()
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host_suffixes.is_empty() && self.substrings.is_empty() && self.regexes.is_empty()
    }

    /// Match a request URL against this set. `host` must be the lowercased
    /// request hostname. Exceptions are checked first: any exception
    /// substring present in the URL vetoes every block from this set.
    pub fn match_url(&self, url: &str, host: &str) -> Option<LocalMatch> {
        if self.is_empty() {
            return None;
        }

        let url_lc = url.to_ascii_lowercase();

        if self.exceptions.iter().any(|e| url_lc.contains(e.as_str())) {
            return None;
        }

        if let Some(suffix) = walk_suffixes(host, &self.host_suffixes) {
            return Some(LocalMatch::HostSuffix(suffix.to_string()));
        }

        match &self.substring_ac {
            Some(ac) => {
                if let Some(m) = ac.find(url_lc.as_str()) {
                    return Some(LocalMatch::Substring(
                        self.substrings[m.pattern().as_usize()].clone(),
                    ));
                }
            }
            None => {
                if let Some(s) = self.substrings.iter().find(|s| url_lc.contains(s.as_str())) {
                    return Some(LocalMatch::Substring(s.clone()));
                }
            }
        }

        for (rule, re) in &self.regexes {
            if re.is_match(url) {
                return Some(LocalMatch::Pattern(rule.clone()));
            }
        }

        None
    }
}
