//! WebShield Filter List Crate
//!
//! Parses EasyList-style filter text into the core's `FilterRuleSet` and
//! handles list acquisition: remote download, on-disk cache fallback, and
//! the bundled default list.

pub mod fetch;
pub mod parser;

pub use fetch::{ListError, ListFetcher, ListSource, BUNDLED_RULES, DEFAULT_SOURCES};
pub use parser::{parse_lists, translate_anchored_prefix, translate_wildcard, ParseTotals};
