//! Classification engine and decision pipeline
//!
//! One `ClassificationEngine` is shared by every browsing context. It holds
//! the current immutable ruleset by reference (swapped atomically on list
//! refresh), the optional full rule engine, the heuristic classifier, the
//! user settings, and the diagnostics state. `decide()` is synchronous and
//! does no I/O; list refresh happens out-of-band.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::adapter::{NullEngine, RuleEngine};
use crate::diagnostics::{BlockEvent, BlockStats, Diagnostics};
use crate::heuristics::{is_suggestion_endpoint, HeuristicClassifier};
use crate::ruleset::FilterRuleSet;
use crate::types::{RequestDescriptor, ResourceType, Verdict, VerdictAction, VerdictSource};
use crate::url;

// =============================================================================
// Static host sets and parameter catalogue
// =============================================================================

/// Hosts too risky to filter aggressively: streaming media infrastructure
/// where a false positive kills playback outright.
const CRITICAL_HOST_SUFFIXES: &[&str] = &[
    "googlevideo.com",
    "ytimg.com",
    "vimeocdn.com",
    "nflxvideo.net",
    "nflxso.net",
    "nflximg.net",
    "ttvnw.net",
    "twitchcdn.net",
    "sndcdn.com",
    "cdninstagram.com",
    "akamaized.net",
];

/// Campaign and click-id query parameters stripped from every URL.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "gclid",
    "gclsrc",
    "dclid",
    "wbraid",
    "gbraid",
    "fbclid",
    "msclkid",
    "twclid",
    "yclid",
    "igshid",
    "mc_cid",
    "mc_eid",
    "mkt_tok",
    "_hsenc",
    "_hsmi",
    "vero_id",
    "oly_enc_id",
    "oly_anon_id",
];

/// Local-development hosts exempt from the HTTPS upgrade.
fn is_local_dev_host(host: &str) -> bool {
    host == "localhost"
        || host == "127.0.0.1"
        || host == "[::1]"
        || host == "0.0.0.0"
        || host.ends_with(".localhost")
        || host.ends_with(".local")
        || host.ends_with(".test")
}

/// Value injected by the response-headers hook when a response carries no
/// `Referrer-Policy`. Independent of the blocking pipeline.
pub fn referrer_policy_default(existing: Option<&str>) -> Option<&'static str> {
    match existing {
        Some(v) if !v.trim().is_empty() => None,
        _ => Some("strict-origin-when-cross-origin"),
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Engine settings, pushed from the shell's settings store on every change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Master switch for the blocking layers (upgrade/strip are separate).
    pub enabled: bool,
    /// Rewrite plain-http main-frame navigations to https.
    pub https_upgrade: bool,
    /// Hostnames for which blocking is fully suspended.
    pub allowlist: HashSet<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            https_upgrade: true,
            allowlist: HashSet::new(),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The shared request classification engine.
pub struct ClassificationEngine {
    ruleset: ArcSwap<FilterRuleSet>,
    rule_engine: RwLock<Arc<dyn RuleEngine>>,
    heuristics: HeuristicClassifier,
    settings: RwLock<EngineSettings>,
    diagnostics: Diagnostics,
}

impl ClassificationEngine {
    /// Engine with an empty local ruleset and the null rule engine.
    pub fn new() -> Self {
        Self {
            ruleset: ArcSwap::from_pointee(FilterRuleSet::empty()),
            rule_engine: RwLock::new(Arc::new(NullEngine)),
            heuristics: HeuristicClassifier::new(),
            settings: RwLock::new(EngineSettings::default()),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_ruleset(ruleset: FilterRuleSet) -> Self {
        let engine = Self::new();
        engine.install_ruleset(ruleset);
        engine
    }

    /// Atomically replace the local ruleset. In-flight `decide()` calls
    /// keep the snapshot they already loaded.
    pub fn install_ruleset(&self, ruleset: FilterRuleSet) {
        self.ruleset.store(Arc::new(ruleset));
    }

    /// Swap in a (probed) rule engine.
    pub fn set_rule_engine(&self, engine: Arc<dyn RuleEngine>) {
        *self.rule_engine.write() = engine;
    }

    /// Bind the rule engine to a new browsing context. A failure here is
    /// logged and isolated: other contexts and the shared ruleset are
    /// unaffected.
    pub fn attach_context(&self, context_id: u64) {
        let engine = self.rule_engine.read().clone();
        if let Err(e) = engine.attach(context_id) {
            warn!("context {context_id}: {e}");
        }
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    pub fn update_settings(&self, settings: EngineSettings) {
        *self.settings.write() = settings;
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings.read().clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.settings.write().enabled = enabled;
    }

    /// Per-site toggle: suspend blocking for a hostname.
    pub fn allow_host(&self, host: &str) {
        self.settings
            .write()
            .allowlist
            .insert(host.to_ascii_lowercase());
    }

    pub fn unallow_host(&self, host: &str) {
        self.settings.write().allowlist.remove(&host.to_ascii_lowercase());
    }

    pub fn is_allowlisted(&self, host: &str) -> bool {
        self.settings.read().allowlist.contains(&host.to_ascii_lowercase())
    }

    // -------------------------------------------------------------------------
    // Diagnostics surface
    // -------------------------------------------------------------------------

    pub fn stats(&self) -> BlockStats {
        self.diagnostics.stats()
    }

    pub fn reset_stats(&self) {
        self.diagnostics.reset_stats()
    }

    /// Recent blocking decisions, newest first.
    pub fn recent_blocked(&self) -> Vec<BlockEvent> {
        self.diagnostics.recent()
    }

    pub fn clear_recent(&self) {
        self.diagnostics.clear()
    }

    /// Rule counts of the currently installed local ruleset.
    pub fn ruleset_counts(&self) -> (usize, usize, usize, usize) {
        let rs = self.ruleset.load();
        (
            rs.host_suffix_count(),
            rs.substring_count(),
            rs.regex_count(),
            rs.exception_count(),
        )
    }

    // -------------------------------------------------------------------------
    // Decision pipeline
    // -------------------------------------------------------------------------

    /// Classify one request. Exactly one verdict per call; cancel and
    /// redirect verdicts are recorded into diagnostics, and exactly one
    /// counter is incremented.
    pub fn decide(&self, desc: &RequestDescriptor) -> Verdict {
        let verdict = self.classify(desc);

        match verdict.action {
            VerdictAction::Allow => self.diagnostics.count_allowed(),
            _ => {
                self.diagnostics.count_blocked();
                let mut event = BlockEvent::new(
                    verdict.source,
                    desc.url.clone(),
                    desc.resource_type,
                    desc.host(),
                );
                if let Some(rule) = &verdict.matched_rule {
                    event = event.with_rule(rule.clone());
                }
                self.diagnostics.record(event);
            }
        }

        verdict
    }

    fn classify(&self, desc: &RequestDescriptor) -> Verdict {
        let settings = self.settings.read();
        let host = desc.host();

        // 1. Protocol upgrade, independent of ad blocking.
        if desc.is_main_frame
            && settings.https_upgrade
            && url::is_http(&desc.url)
            && !is_local_dev_host(&host)
        {
            let upgraded = format!("https://{}", &desc.url["http://".len()..]);
            return Verdict::redirect(upgraded, VerdictSource::HttpsUpgrade);
        }

        // 2. Tracking-parameter stripping, any URL.
        if let Some(cleaned) = url::remove_query_params(&desc.url, TRACKING_PARAMS) {
            return Verdict::redirect(cleaned, VerdictSource::StripParams);
        }

        // 3. Scope filter.
        if !settings.enabled
            || desc.is_main_frame
            || !desc.resource_type.intersects(ResourceType::MONITORED)
        {
            return Verdict::allow(VerdictSource::Default);
        }

        // 4. Allowlist bypass on the referrer host.
        let referrer_host = desc.referrer_host();
        if !referrer_host.is_empty() && settings.allowlist.contains(&referrer_host) {
            return Verdict::allow(VerdictSource::BypassAllowlist);
        }

        // 5. Suggestion endpoints are never blocked.
        if is_suggestion_endpoint(&desc.url) {
            return Verdict::allow(VerdictSource::BypassSuggestion);
        }

        // 6. Critical hosts bypass every matcher.
        if let Some(suffix) = CRITICAL_HOST_SUFFIXES
            .iter()
            .find(|s| url::host_matches_suffix(&host, s))
        {
            debug!(
                "request {} to critical host {host} (suffix {suffix}) bypassed",
                desc.request_id
            );
            return Verdict::allow(VerdictSource::BypassCriticalHost);
        }

        // 7. Full rule engine, errors fall through.
        let engine = self.rule_engine.read().clone();
        match engine.match_request(desc) {
            Ok(m) => {
                if let Some(target) = m.redirect_url {
                    return Verdict::redirect(target, VerdictSource::RuleEngineRedirect);
                }
                if m.matched {
                    return Verdict::cancel(VerdictSource::RuleEngineMatch);
                }
            }
            Err(e) => debug!("rule engine error, falling through: {e}"),
        }

        // 8. Local ruleset: exceptions, host suffixes, substrings, regexes.
        let ruleset = self.ruleset.load();
        if let Some(m) = ruleset.match_url(&desc.url, &host) {
            let source = if m.is_host_suffix() {
                VerdictSource::LocalHostSuffix
            } else {
                VerdictSource::LocalParser
            };
            return Verdict::cancel(source).with_rule(m.rule());
        }

        // 9. Heuristics run last.
        if self.heuristics.classify(desc, &settings.allowlist) {
            return Verdict::cancel(VerdictSource::Heuristic);
        }

        // 10. Default.
        Verdict::allow(VerdictSource::Default)
    }
}

impl Default for ClassificationEngine {
    fn default() -> Self {
        Self::new()
    }
}
