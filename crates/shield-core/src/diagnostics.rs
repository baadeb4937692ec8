//! Diagnostics ring buffer and aggregate counters
//!
//! Process-lifetime state: a bounded FIFO of recent blocking decisions plus
//! monotonic blocked/allowed counters, exposed to the shell's diagnostics
//! panel. Insertion and eviction are O(1); no I/O happens here.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{ResourceType, VerdictSource};

/// Ring buffer capacity. Oldest entries are evicted on overflow.
pub const RECENT_CAPACITY: usize = 200;

/// One recorded blocking decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEvent {
    pub timestamp: DateTime<Utc>,
    pub source: VerdictSource,
    pub url: String,
    pub resource_type: String,
    pub request_host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
}

impl BlockEvent {
    pub fn new(
        source: VerdictSource,
        url: impl Into<String>,
        resource_type: ResourceType,
        request_host: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            url: url.into(),
            resource_type: resource_type.label().to_string(),
            request_host: request_host.into(),
            matched_rule: None,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.matched_rule = Some(rule.into());
        self
    }
}

/// Aggregate counters, resettable on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    pub blocked: u64,
    pub allowed: u64,
}

/// Bounded history of recent decisions plus counters.
pub struct Diagnostics {
    recent: Mutex<VecDeque<BlockEvent>>,
    blocked: AtomicU64,
    allowed: AtomicU64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)),
            blocked: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
        }
    }

    /// Record one blocking decision, evicting the oldest on overflow.
    pub fn record(&self, event: BlockEvent) {
        let mut recent = self.recent.lock();
        if recent.len() == RECENT_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(event);
    }

    /// Recent events, most recent first.
    pub fn recent(&self) -> Vec<BlockEvent> {
        self.recent.lock().iter().rev().cloned().collect()
    }

    /// Drop all recorded events. Counters are unaffected.
    pub fn clear(&self) {
        self.recent.lock().clear();
    }

    pub fn count_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_allowed(&self) {
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> BlockStats {
        BlockStats {
            blocked: self.blocked.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.blocked.store(0, Ordering::Relaxed);
        self.allowed.store(0, Ordering::Relaxed);
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}
