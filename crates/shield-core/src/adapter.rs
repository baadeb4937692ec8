//! Rule engine adapter
//!
//! The full-featured rule engine is an optional capability: it may be
//! compiled out, or fail to load at runtime. The pipeline talks to it only
//! through the `RuleEngine` trait and falls back to the local ruleset and
//! heuristics when it is absent or errors.

use std::collections::HashSet;

use log::debug;
use parking_lot::Mutex;

use crate::error::Result;
use crate::types::{EngineMatch, RequestDescriptor};

/// Network-layer rule matching capability.
///
/// Implementations must be side-effect free on the match path and must
/// never panic; match failures are reported as errors and the caller
/// treats them as "no match".
pub trait RuleEngine: Send + Sync {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Is this engine actually loaded with rules?
    fn is_loaded(&self) -> bool;

    /// Match one request. `Ok` with `matched == false` means no opinion.
    fn match_request(&self, desc: &RequestDescriptor) -> Result<EngineMatch>;

    /// Bind the engine to one browsing context. Idempotent; failure for
    /// one context must not affect others.
    fn attach(&self, context_id: u64) -> Result<()>;
}

// =============================================================================
// Null engine
// =============================================================================

/// Engine selected when no full rule engine is available. Always reports
/// not-matched so the pipeline degrades to the local layers.
pub struct NullEngine;

impl RuleEngine for NullEngine {
    fn name(&self) -> &'static str {
        "null"
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn match_request(&self, _desc: &RequestDescriptor) -> Result<EngineMatch> {
        Ok(EngineMatch::default())
    }

    fn attach(&self, _context_id: u64) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Attach bookkeeping
// =============================================================================

/// Tracks which browsing contexts an engine has bound to, making
/// `attach` idempotent.
pub struct AttachTracker {
    attached: Mutex<HashSet<u64>>,
}

impl AttachTracker {
    pub fn new() -> Self {
        Self {
            attached: Mutex::new(HashSet::new()),
        }
    }

    /// Returns true if this context was not attached before.
    pub fn mark(&self, context_id: u64) -> bool {
        self.attached.lock().insert(context_id)
    }

    pub fn is_attached(&self, context_id: u64) -> bool {
        self.attached.lock().contains(&context_id)
    }

    pub fn detach(&self, context_id: u64) {
        self.attached.lock().remove(&context_id);
    }
}

impl Default for AttachTracker {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// adblock-backed engine (optional)
// =============================================================================

#[cfg(feature = "adblock-engine")]
mod adblock_engine {
    use super::*;

    use crate::error::ClassificationError;

    use adblock::lists::{FilterSet, ParseOptions, RuleTypes};
    use adblock::request::Request;
    use adblock::Engine;

    /// Adapter over the `adblock` crate. Network rules only: cosmetic and
    /// scriptlet handling is disabled at parse time because DOM mutation
    /// conflicts with page content-security policies in the host shell.
    pub struct AdblockRuleEngine {
        engine: Engine,
        tracker: AttachTracker,
    }

    impl AdblockRuleEngine {
        /// Build from raw filter list lines.
        pub fn from_lines(lines: &[String]) -> Result<Self> {
            let mut set = FilterSet::new(false);
            let opts = ParseOptions {
                rule_types: RuleTypes::NetworkOnly,
                ..ParseOptions::default()
            };
            set.add_filters(lines, opts);

            let engine = Engine::from_filter_set(set, true);
            Ok(Self {
                engine,
                tracker: AttachTracker::new(),
            })
        }
    }

    impl RuleEngine for AdblockRuleEngine {
        fn name(&self) -> &'static str {
            "adblock"
        }

        fn is_loaded(&self) -> bool {
            true
        }

        fn match_request(&self, desc: &RequestDescriptor) -> Result<EngineMatch> {
            let request = Request::new(
                &desc.url,
                &desc.referrer,
                desc.resource_type.label(),
            )
            .map_err(|e| ClassificationError::EngineMatch(format!("{e:?}")))?;

            let result = self.engine.check_network_request(&request);
            Ok(EngineMatch {
                matched: result.matched,
                redirect_url: result.redirect,
            })
        }

        fn attach(&self, context_id: u64) -> Result<()> {
            if self.tracker.mark(context_id) {
                debug!("rule engine attached to context {context_id}");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "adblock-engine")]
pub use adblock_engine::AdblockRuleEngine;

// =============================================================================
// Probing
// =============================================================================

/// Select the best available engine for the given list text.
///
/// With the `adblock-engine` feature: try to build the full engine from
/// the supplied lines, falling back to `NullEngine` on failure. Without
/// the feature the lines are ignored and `NullEngine` is returned.
pub fn probe_engine(lines: &[String]) -> Box<dyn RuleEngine> {
    #[cfg(feature = "adblock-engine")]
    {
        if !lines.is_empty() {
            match AdblockRuleEngine::from_lines(lines) {
                Ok(engine) => return Box::new(engine),
                Err(e) => log::warn!("full rule engine unavailable: {e}"),
            }
        }
    }
    #[cfg(not(feature = "adblock-engine"))]
    {
        let _ = lines;
    }
    debug!("using null rule engine");
    Box::new(NullEngine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceType;

    #[test]
    fn null_engine_never_matches() {
        let engine = NullEngine;
        let desc = RequestDescriptor::new("https://ads.example.com/x.js", ResourceType::SCRIPT);
        let m = engine.match_request(&desc).unwrap();
        assert!(!m.matched);
        assert!(m.redirect_url.is_none());
        assert!(!engine.is_loaded());
    }

    #[test]
    fn attach_tracker_is_idempotent() {
        let tracker = AttachTracker::new();
        assert!(tracker.mark(1));
        assert!(!tracker.mark(1));
        assert!(tracker.is_attached(1));
        tracker.detach(1);
        assert!(!tracker.is_attached(1));
        assert!(tracker.mark(1));
    }

    #[test]
    fn probe_without_lines_yields_null() {
        let engine = probe_engine(&[]);
        assert_eq!(engine.name(), "null");
    }
}
