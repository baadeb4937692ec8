//! Core type definitions for WebShield
//!
//! These types cross the boundary between the embedding browser shell and
//! the classification engine and are used throughout the decision pipeline.

use serde::{Deserialize, Serialize};

// =============================================================================
// Resource Types (bit mask for scope filtering)
// =============================================================================

bitflags::bitflags! {
    /// Request resource type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBFRAME = 1 << 5;
        const MAIN_FRAME = 1 << 6;
        const XHR = 1 << 7;
        const FETCH = 1 << 8;
        const WEBSOCKET = 1 << 9;
        const FONT = 1 << 10;
        const MEDIA = 1 << 11;
        const PING = 1 << 12;

        /// Types the blocking pipeline inspects at all. Main-frame
        /// navigations are handled by the upgrade/strip stages only.
        const MONITORED = Self::OTHER.bits()
            | Self::SCRIPT.bits()
            | Self::IMAGE.bits()
            | Self::STYLESHEET.bits()
            | Self::OBJECT.bits()
            | Self::SUBFRAME.bits()
            | Self::XHR.bits()
            | Self::FETCH.bits()
            | Self::WEBSOCKET.bits()
            | Self::FONT.bits()
            | Self::MEDIA.bits()
            | Self::PING.bits();

        /// Types the heuristic classifier treats as suspect when the
        /// request is cross-origin to its referrer.
        const SUSPECT = Self::SCRIPT.bits()
            | Self::IMAGE.bits()
            | Self::SUBFRAME.bits()
            | Self::XHR.bits()
            | Self::FETCH.bits();
    }
}

impl ResourceType {
    /// Parse from the host's request type string. Accepts both the
    /// Chromium snake_case names and the Electron camelCase names.
    pub fn from_type_str(s: &str) -> Self {
        match s {
            "main_frame" | "mainFrame" => Self::MAIN_FRAME,
            "sub_frame" | "subFrame" => Self::SUBFRAME,
            "stylesheet" => Self::STYLESHEET,
            "script" => Self::SCRIPT,
            "image" => Self::IMAGE,
            "font" => Self::FONT,
            "object" => Self::OBJECT,
            "xmlhttprequest" | "xhr" => Self::XHR,
            "fetch" => Self::FETCH,
            "ping" | "beacon" => Self::PING,
            "media" => Self::MEDIA,
            "websocket" | "webSocket" => Self::WEBSOCKET,
            _ => Self::OTHER,
        }
    }

    /// Canonical name for diagnostics output.
    pub fn label(self) -> &'static str {
        if self == Self::MAIN_FRAME {
            "main_frame"
        } else if self == Self::SUBFRAME {
            "sub_frame"
        } else if self == Self::STYLESHEET {
            "stylesheet"
        } else if self == Self::SCRIPT {
            "script"
        } else if self == Self::IMAGE {
            "image"
        } else if self == Self::FONT {
            "font"
        } else if self == Self::OBJECT {
            "object"
        } else if self == Self::XHR {
            "xmlhttprequest"
        } else if self == Self::FETCH {
            "fetch"
        } else if self == Self::PING {
            "ping"
        } else if self == Self::MEDIA {
            "media"
        } else if self == Self::WEBSOCKET {
            "websocket"
        } else {
            "other"
        }
    }
}

// =============================================================================
// Request Descriptor
// =============================================================================

/// One intercepted request, as described by the host's webRequest hook.
/// Ephemeral: created per request, consumed synchronously by `decide()`.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Full request URL.
    pub url: String,
    /// Resource type of the request.
    pub resource_type: ResourceType,
    /// Referrer URL, empty when the host reports none.
    pub referrer: String,
    /// Is this a top-level navigation?
    pub is_main_frame: bool,
    /// Host-assigned request id, carried through for logging.
    pub request_id: u64,
}

impl RequestDescriptor {
    pub fn new(url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            url: url.into(),
            resource_type,
            referrer: String::new(),
            is_main_frame: resource_type == ResourceType::MAIN_FRAME,
            request_id: 0,
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn with_request_id(mut self, id: u64) -> Self {
        self.request_id = id;
        self
    }

    /// Lowercased request hostname, empty if the URL has none.
    pub fn host(&self) -> String {
        crate::url::extract_host(&self.url)
            .unwrap_or("")
            .to_ascii_lowercase()
    }

    /// Lowercased referrer hostname, empty if absent.
    pub fn referrer_host(&self) -> String {
        crate::url::extract_host(&self.referrer)
            .unwrap_or("")
            .to_ascii_lowercase()
    }
}

// =============================================================================
// Verdicts
// =============================================================================

/// What the host should do with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictAction {
    /// Let the request proceed untouched.
    Allow,
    /// Never issue the request.
    Cancel,
    /// Re-issue the request at a different URL.
    Redirect(String),
}

/// Which pipeline stage produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerdictSource {
    HttpsUpgrade,
    StripParams,
    BypassAllowlist,
    BypassSuggestion,
    BypassCriticalHost,
    RuleEngineRedirect,
    RuleEngineMatch,
    LocalHostSuffix,
    LocalParser,
    Heuristic,
    Default,
}

impl VerdictSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::HttpsUpgrade => "https-upgrade",
            Self::StripParams => "strip-params",
            Self::BypassAllowlist => "bypass-allowlist",
            Self::BypassSuggestion => "bypass-suggestion",
            Self::BypassCriticalHost => "bypass-critical-host",
            Self::RuleEngineRedirect => "rule-engine-redirect",
            Self::RuleEngineMatch => "rule-engine-match",
            Self::LocalHostSuffix => "local-host-suffix",
            Self::LocalParser => "local-parser",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

/// The pipeline's decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub action: VerdictAction,
    pub source: VerdictSource,
    /// Rule text that determined the decision, when one exists.
    pub matched_rule: Option<String>,
}

impl Verdict {
    pub fn allow(source: VerdictSource) -> Self {
        Self {
            action: VerdictAction::Allow,
            source,
            matched_rule: None,
        }
    }

    pub fn cancel(source: VerdictSource) -> Self {
        Self {
            action: VerdictAction::Cancel,
            source,
            matched_rule: None,
        }
    }

    pub fn redirect(target: impl Into<String>, source: VerdictSource) -> Self {
        Self {
            action: VerdictAction::Redirect(target.into()),
            source,
            matched_rule: None,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.matched_rule = Some(rule.into());
        self
    }

    pub fn is_allow(&self) -> bool {
        self.action == VerdictAction::Allow
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Self::allow(VerdictSource::Default)
    }
}

// =============================================================================
// Rule Engine Match
// =============================================================================

/// Normalized result from the full rule engine adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineMatch {
    /// Did a network rule match?
    pub matched: bool,
    /// Redirect target proposed by a `$redirect` rule, if any.
    pub redirect_url: Option<String>,
}
