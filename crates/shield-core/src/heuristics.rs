//! Heuristic ad/tracker classifier
//!
//! Fallback detector used when neither the full rule engine nor the local
//! ruleset matched. Pattern, keyword, and host-suffix based; first match
//! wins, with two hard guards up front: suggestion endpoints and
//! allowlisted referrers are never classified as ads.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

use crate::types::{RequestDescriptor, ResourceType};
use crate::url::{extract_path, extract_query, host_matches_suffix, last_path_segment};

// =============================================================================
// Signature data
// =============================================================================

/// Search-as-you-type endpoints. Blocking any of these breaks the address
/// bar, so they bypass every other signal.
const SUGGESTION_ENDPOINTS: &[&str] = &[
    "duckduckgo.com/ac/",
    "ac.duckduckgo.com/",
    "suggestqueries.google.com/",
    "clients1.google.com/complete/",
    "www.google.com/complete/search",
    "api.bing.com/osjson",
    "www.bing.com/as/suggestions",
    "search.brave.com/api/suggest",
    "ac.ecosia.org/",
    "api.qwant.com/v3/suggest",
];

/// Known ad/tracking host suffixes. Matched exact-or-subdomain.
const AD_HOST_SUFFIXES: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "googletagmanager.com",
    "googletagservices.com",
    "google-analytics.com",
    "adservice.google.com",
    "adnxs.com",
    "adsrvr.org",
    "adsafeprotected.com",
    "amazon-adsystem.com",
    "criteo.com",
    "criteo.net",
    "taboola.com",
    "outbrain.com",
    "scorecardresearch.com",
    "quantserve.com",
    "rubiconproject.com",
    "pubmatic.com",
    "openx.net",
    "casalemedia.com",
    "moatads.com",
    "bluekai.com",
    "demdex.net",
    "krxd.net",
    "chartbeat.com",
    "hotjar.com",
    "mixpanel.com",
    "segment.io",
    "branch.io",
    "adroll.com",
    "yieldmo.com",
    "smartadserver.com",
    "zedo.com",
];

/// Keyword/vendor signatures compiled into case-insensitive regexes and
/// applied to hostname, path, and query.
const URL_PATTERN_SOURCES: &[&str] = &[
    r"(^|[/.])ads?[/.-]",
    r"/adserv(er|ice)?[/.]",
    r"/pagead/",
    r"/adsbygoogle",
    r"/doubleclick",
    r"/ad[_-]?(slot|unit|frame|call|code)s?\b",
    r"\bbanners?/",
    r"/sponsor(ed)?[/.-]",
    r"/promoted[/.-]",
    r"/track(ing)?[/.?]",
    r"/pixel[/.?]",
    r"/beacon[/.?]",
    r"/telemetry[/.?]",
    r"\banalytics\b",
    r"/metrics?/collect",
    r"/popunder",
    r"\bprebid\b",
    r"\btagmanager\b",
];

/// Heuristics on the last path segment: classic ad asset filenames.
const AD_FILENAME_TOKENS: &[&str] = &[
    "adserver",
    "adsbygoogle",
    "advert",
    "pubads",
    "gpt.js",
    "fbevents.js",
    "analytics.js",
    "gtm.js",
    "beacon.js",
    "pixel.gif",
    "ads.js",
    "adframe",
];

/// Query parameter names that only appear on ad calls.
const AD_QUERY_PARAMS: &[&str] = &[
    "ad_type",
    "adunit",
    "ad_slot",
    "slotname",
    "ad_id",
    "adid",
    "advertiser_id",
    "placement_id",
    "creative_id",
    "banner_id",
    "adurl",
];

/// Hosts of the large video platform where broad heuristics are suppressed:
/// blocking anything but explicit ad endpoints there breaks playback.
const VIDEO_PLATFORM_SUFFIXES: &[&str] = &[
    "youtube.com",
    "youtube-nocookie.com",
    "googlevideo.com",
    "ytimg.com",
];

/// Explicit ad markers that are still blocked on the video platform.
const VIDEO_AD_MARKERS: &[&str] = &[
    "/pagead/",
    "/api/stats/ads",
    "ad_break",
    "adunit",
    "&adurl=",
    "?adurl=",
    "get_midroll_info",
];

// =============================================================================
// Classifier
// =============================================================================

/// Compiled heuristic signatures. Built once, owned by the engine.
pub struct HeuristicClassifier {
    url_patterns: Vec<Regex>,
}

impl HeuristicClassifier {
    pub fn new() -> Self {
        // Sources are static and known-good; a pattern that fails to
        // compile is dropped like any other malformed rule.
        let url_patterns = URL_PATTERN_SOURCES
            .iter()
            .filter_map(|src| {
                RegexBuilder::new(src)
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();
        Self { url_patterns }
    }

    /// True when the request is likely an ad or tracker call.
    /// First match wins; guards short-circuit to false.
    pub fn classify(&self, desc: &RequestDescriptor, allowlist: &HashSet<String>) -> bool {
        let url = desc.url.as_str();

        if is_suggestion_endpoint(url) {
            return false;
        }

        let referrer_host = desc.referrer_host();
        if !referrer_host.is_empty() && allowlist.contains(&referrer_host) {
            return false;
        }

        let host = desc.host();
        let path = extract_path(url);
        let query = extract_query(url);

        if is_video_platform_host(&host) {
            return has_video_ad_marker(path, query);
        }

        if AD_HOST_SUFFIXES
            .iter()
            .any(|suffix| host_matches_suffix(&host, suffix))
        {
            return true;
        }

        if self.matches_pattern(&host) || self.matches_pattern(path) || self.matches_pattern(query)
        {
            return true;
        }

        let filename = last_path_segment(url).to_ascii_lowercase();
        if !filename.is_empty()
            && (filename.starts_with("ad.")
                || AD_FILENAME_TOKENS.iter().any(|t| filename.contains(t)))
        {
            return true;
        }

        if has_ad_query_param(query) {
            return true;
        }

        if is_cross_origin(&host, &referrer_host)
            && desc.resource_type.intersects(ResourceType::SUSPECT)
            && self.matches_pattern(url)
        {
            return true;
        }

        false
    }

    fn matches_pattern(&self, text: &str) -> bool {
        !text.is_empty() && self.url_patterns.iter().any(|re| re.is_match(text))
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Shared predicates
// =============================================================================

/// True if the URL targets a search suggestion/autocomplete API.
/// Also consulted by the pipeline's unconditional bypass stage.
pub fn is_suggestion_endpoint(url: &str) -> bool {
    let url_lc = url.to_ascii_lowercase();
    SUGGESTION_ENDPOINTS.iter().any(|p| url_lc.contains(p))
}

fn is_video_platform_host(host: &str) -> bool {
    VIDEO_PLATFORM_SUFFIXES
        .iter()
        .any(|suffix| host_matches_suffix(host, suffix))
}

fn has_video_ad_marker(path: &str, query: &str) -> bool {
    let path_lc = path.to_ascii_lowercase();
    let query_lc = query.to_ascii_lowercase();
    VIDEO_AD_MARKERS
        .iter()
        .any(|m| path_lc.contains(m) || query_lc.contains(m))
}

fn has_ad_query_param(query: &str) -> bool {
    if query.is_empty() {
        return false;
    }
    query.split('&').any(|pair| {
        let key = match pair.find('=') {
            Some(eq) => &pair[..eq],
            None => pair,
        };
        AD_QUERY_PARAMS.iter().any(|p| key.eq_ignore_ascii_case(p))
    })
}

/// Cross-origin check by hostname. Empty referrer counts as same-origin
/// so bare requests don't trip the suspect-type branch.
fn is_cross_origin(host: &str, referrer_host: &str) -> bool {
    !referrer_host.is_empty() && host != referrer_host
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> HeuristicClassifier {
        HeuristicClassifier::new()
    }

    fn script(url: &str) -> RequestDescriptor {
        RequestDescriptor::new(url, ResourceType::SCRIPT)
    }

    #[test]
    fn suggestion_endpoint_never_classified() {
        let c = classifier();
        // Also carries an ad keyword; the guard must still win.
        let desc = script("https://duckduckgo.com/ac/?q=doubleclick&type=list");
        assert!(!c.classify(&desc, &HashSet::new()));
    }

    #[test]
    fn allowlisted_referrer_suppresses_classification() {
        let c = classifier();
        let desc = script("https://ad.doubleclick.net/x.js")
            .with_referrer("https://trusted.site/page");
        let mut allowlist = HashSet::new();
        allowlist.insert("trusted.site".to_string());
        assert!(!c.classify(&desc, &allowlist));
        assert!(c.classify(&desc, &HashSet::new()));
    }

    #[test]
    fn known_ad_host_suffix_matches() {
        let c = classifier();
        assert!(c.classify(&script("https://cdn.taboola.com/widget.js"), &HashSet::new()));
        assert!(!c.classify(&script("https://example.com/widget.js"), &HashSet::new()));
    }

    #[test]
    fn url_pattern_on_path() {
        let c = classifier();
        assert!(c.classify(&script("https://cdn.site.com/pagead/show.js"), &HashSet::new()));
        assert!(c.classify(&script("https://cdn.site.com/adsbygoogle.js"), &HashSet::new()));
    }

    #[test]
    fn ad_filename_heuristic() {
        let c = classifier();
        assert!(c.classify(&script("https://static.site.com/js/gpt.js"), &HashSet::new()));
        assert!(c.classify(&script("https://static.site.com/ad.12345.js"), &HashSet::new()));
        assert!(!c.classify(&script("https://static.site.com/app.js"), &HashSet::new()));
    }

    #[test]
    fn ad_query_param_heuristic() {
        let c = classifier();
        assert!(c.classify(&script("https://cdn.site.com/serve?adunit=top_banner"), &HashSet::new()));
        assert!(!c.classify(&script("https://cdn.site.com/serve?id=1"), &HashSet::new()));
    }

    #[test]
    fn video_platform_only_blocks_explicit_markers() {
        let c = classifier();
        // Playback segments survive even though googlevideo would trip
        // broader heuristics.
        let playback = script("https://r3---sn-x.googlevideo.com/videoplayback?expire=1");
        assert!(!c.classify(&playback, &HashSet::new()));

        let ad_stats = script("https://www.youtube.com/api/stats/ads?ver=2");
        assert!(c.classify(&ad_stats, &HashSet::new()));

        let pagead = script("https://www.youtube.com/pagead/interaction/?label=x");
        assert!(c.classify(&pagead, &HashSet::new()));
    }

    #[test]
    fn cross_origin_suspect_requires_pattern() {
        let c = classifier();
        let benign = RequestDescriptor::new("https://cdn.other.com/lib.js", ResourceType::SCRIPT)
            .with_referrer("https://news.site/");
        assert!(!c.classify(&benign, &HashSet::new()));

        let tracky = RequestDescriptor::new(
            "https://collect.other.com/v1/telemetry?e=1",
            ResourceType::FETCH,
        )
        .with_referrer("https://news.site/");
        assert!(c.classify(&tracky, &HashSet::new()));
    }

    #[test]
    fn media_type_is_not_suspect() {
        let c = classifier();
        // Same URL shape, but media types stay out of the cross-origin net.
        let desc = RequestDescriptor::new(
            "https://cdn.other.com/chunk.m4s",
            ResourceType::MEDIA,
        )
        .with_referrer("https://video.site/");
        assert!(!c.classify(&desc, &HashSet::new()));
    }
}
