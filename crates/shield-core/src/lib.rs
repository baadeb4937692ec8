//! WebShield Core Library
//!
//! Request classification and blocking engine for the WebShield browser
//! shell. The embedding host intercepts every outgoing request, hands the
//! engine a [`RequestDescriptor`], and enforces the returned [`Verdict`]
//! (allow, cancel, or redirect).
//!
//! # Architecture
//!
//! Decisions run through a layered pipeline: bypass checks (allowlist,
//! suggestion endpoints, critical hosts), then the optional full rule
//! engine, then the local filter-list ruleset, then the heuristic
//! classifier. The ruleset is immutable and swapped atomically on refresh;
//! `decide()` is synchronous and performs no I/O.
//!
//! # Modules
//!
//! - `types`: request descriptors, verdicts, resource type masks
//! - `url`: fast URL slicing for the hot path
//! - `ruleset`: immutable filter ruleset and its match routine
//! - `heuristics`: pattern/keyword/host-suffix fallback classifier
//! - `adapter`: optional full rule engine behind a capability trait
//! - `engine`: the shared classification engine and decision pipeline
//! - `diagnostics`: bounded event ring buffer and counters
//! - `error`: non-fatal error taxonomy

pub mod adapter;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod ruleset;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use adapter::{probe_engine, NullEngine, RuleEngine};
pub use diagnostics::{BlockEvent, BlockStats, Diagnostics, RECENT_CAPACITY};
pub use engine::{referrer_policy_default, ClassificationEngine, EngineSettings};
pub use error::ClassificationError;
pub use heuristics::HeuristicClassifier;
pub use ruleset::{FilterRuleSet, LocalMatch};
pub use types::{EngineMatch, RequestDescriptor, ResourceType, Verdict, VerdictAction, VerdictSource};
