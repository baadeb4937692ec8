//! Error taxonomy for the classification engine
//!
//! Every variant here is non-fatal by design: the pipeline logs it and
//! falls through to the next stage. Nothing in this crate may prevent a
//! request from being allowed through.

use thiserror::Error;

/// Errors surfaced by pipeline stages and the rule engine adapter.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// The optional full rule engine is not loaded.
    #[error("rule engine unavailable")]
    EngineUnavailable,

    /// The rule engine failed while matching a request.
    #[error("rule engine match failed: {0}")]
    EngineMatch(String),

    /// The rule engine could not be built from list text.
    #[error("rule engine build failed: {0}")]
    EngineBuild(String),

    /// The rule engine could not bind to one browsing context.
    /// Isolated per context; other contexts are unaffected.
    #[error("failed to attach rule engine to context {context_id}: {reason}")]
    AttachFailed { context_id: u64, reason: String },
}

pub type Result<T> = std::result::Result<T, ClassificationError>;
