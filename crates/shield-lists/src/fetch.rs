//! Filter list acquisition
//!
//! Lists come from three places, in preference order: a fresh download of
//! the configured sources, the on-disk cache written by the last good
//! download, and the bundled default list shipped with the application.
//! All fetching is out-of-band: the engine keeps serving whichever
//! ruleset snapshot is installed until `refresh_into` swaps in a new one.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use shield_core::{probe_engine, ClassificationEngine, FilterRuleSet, RuleEngine};

use crate::parser::{parse_lists, ParseTotals};

/// Rule text bundled with the application, used when both network and
/// cache are unavailable.
pub const BUNDLED_RULES: &str = include_str!("../data/default_filters.txt");

/// Timeout for one list download.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One remote filter list.
#[derive(Debug, Clone, Copy)]
pub struct ListSource {
    /// Cache file stem.
    pub name: &'static str,
    pub url: &'static str,
}

/// The two primary lists the shell subscribes to.
pub const DEFAULT_SOURCES: &[ListSource] = &[
    ListSource {
        name: "easylist",
        url: "https://easylist.to/easylist/easylist.txt",
    },
    ListSource {
        name: "easyprivacy",
        url: "https://easylist.to/easylist/easyprivacy.txt",
    },
];

/// Errors from list acquisition. All are non-fatal to the engine: the
/// worst case is an empty local ruleset with heuristics still active.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("list '{0}' unavailable from network and cache")]
    Unavailable(&'static str),
}

/// Downloads lists and maintains the on-disk cache.
pub struct ListFetcher {
    sources: Vec<ListSource>,
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl ListFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_sources(cache_dir, DEFAULT_SOURCES.to_vec())
    }

    pub fn with_sources(cache_dir: impl Into<PathBuf>, sources: Vec<ListSource>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("http client init failed ({e}), using defaults");
                reqwest::Client::new()
            });
        Self {
            sources,
            cache_dir: cache_dir.into(),
            client,
        }
    }

    fn cache_path(&self, source: &ListSource) -> PathBuf {
        self.cache_dir.join(format!("{}.txt", source.name))
    }

    /// Fetch one source, writing the cache on success and falling back to
    /// the cache on failure.
    async fn fetch_source(&self, source: &ListSource) -> Result<String, ListError> {
        match self.download(source).await {
            Ok(text) => {
                if let Err(e) = write_cache(&self.cache_path(source), &text) {
                    warn!("failed to cache {}: {e}", source.name);
                }
                Ok(text)
            }
            Err(e) => {
                debug!("download of {} failed ({e}), trying cache", source.name);
                read_cache(&self.cache_path(source))
                    .ok_or(ListError::Unavailable(source.name))
            }
        }
    }

    async fn download(&self, source: &ListSource) -> Result<String, ListError> {
        let response = self.client.get(source.url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// All available list texts: each source (network, then cache) plus
    /// the bundled default. Sources that fail both ways are skipped.
    pub async fn fetch_all(&self) -> Vec<String> {
        let mut blobs = Vec::with_capacity(self.sources.len() + 1);
        for source in &self.sources {
            match self.fetch_source(source).await {
                Ok(text) => blobs.push(text),
                Err(e) => warn!("{e}"),
            }
        }
        blobs.push(BUNDLED_RULES.to_string());
        blobs
    }

    /// Cached texts only, plus the bundled default. Used for the initial
    /// synchronous build before any download has run.
    pub fn cached_all(&self) -> Vec<String> {
        let mut blobs: Vec<String> = self
            .sources
            .iter()
            .filter_map(|s| read_cache(&self.cache_path(s)))
            .collect();
        blobs.push(BUNDLED_RULES.to_string());
        blobs
    }

    /// Build a fresh ruleset from the best available list texts.
    pub async fn load_ruleset(&self) -> (FilterRuleSet, ParseTotals) {
        let blobs = self.fetch_all().await;
        parse_lists(&blobs)
    }

    /// Build and atomically install a fresh ruleset into a running engine.
    pub async fn refresh_into(&self, engine: &ClassificationEngine) -> ParseTotals {
        let (ruleset, totals) = self.load_ruleset().await;
        info!(
            "installing ruleset: {} host suffixes, {} substrings, {} regexes, {} exceptions",
            ruleset.host_suffix_count(),
            ruleset.substring_count(),
            ruleset.regex_count(),
            ruleset.exception_count()
        );
        engine.install_ruleset(ruleset);
        totals
    }

    /// Probe for the full rule engine: cached list text first, then a
    /// fresh download. Reports the null engine when neither yields one
    /// (or the `adblock-engine` feature is compiled out).
    pub async fn probe_rule_engine(&self) -> Box<dyn RuleEngine> {
        let cached = collect_lines(&self.cached_all());
        let engine = probe_engine(&cached);
        if engine.is_loaded() {
            return engine;
        }

        if cfg!(feature = "adblock-engine") {
            let fetched = collect_lines(&self.fetch_all().await);
            let engine = probe_engine(&fetched);
            if engine.is_loaded() {
                return engine;
            }
        }

        engine
    }
}

fn collect_lines(blobs: &[String]) -> Vec<String> {
    blobs
        .iter()
        .flat_map(|b| b.lines())
        .map(|l| l.to_string())
        .collect()
}

fn write_cache(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}

fn read_cache(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("webshield-test-{}-{tag}", std::process::id()))
    }

    #[test]
    fn bundled_rules_parse_to_nonempty_set() {
        let (rs, totals) = parse_lists(&[BUNDLED_RULES]);
        assert!(!rs.is_empty());
        assert!(totals.host_suffixes > 0);
        assert!(totals.exceptions > 0);
    }

    #[test]
    fn cache_roundtrip() {
        let dir = temp_cache_dir("roundtrip");
        let path = dir.join("easylist.txt");
        write_cache(&path, "||doubleclick.net^\n").unwrap();
        assert_eq!(read_cache(&path), Some("||doubleclick.net^\n".to_string()));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_cache_file_is_ignored() {
        let dir = temp_cache_dir("empty");
        let path = dir.join("easylist.txt");
        write_cache(&path, "").unwrap();
        assert_eq!(read_cache(&path), None);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn cached_all_always_includes_bundled() {
        let fetcher = ListFetcher::new(temp_cache_dir("nocache"));
        let blobs = fetcher.cached_all();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0], BUNDLED_RULES);
    }

    #[test]
    fn collect_lines_flattens_blobs() {
        let blobs = vec!["a\nb".to_string(), "c".to_string()];
        assert_eq!(collect_lines(&blobs), vec!["a", "b", "c"]);
    }
}
