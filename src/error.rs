use crate::editor::EditorError;

/// Failures that abort the processing of a single document
///
/// Recoverable conditions (unresolved assets, a skipped leak filter) are not
/// errors; they travel as [`crate::models::Degradation`] diagnostics instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The editing interface failed permanently, or stayed busy past the retry budget
    #[error("editing interface error: {0}")]
    Interface(#[from] EditorError),

    /// The generative session has no composer to receive the submission
    #[error("no message composer available: {0}")]
    MissingComposer(String),

    /// The submission could not be delivered, or the session broke while answering
    #[error("submission failed: {0}")]
    Submission(String),

    /// No complete, stable answer within the polling budget
    #[error("no complete, stable response within {waited_secs}s (best candidate: {best_len} chars)")]
    StabilizationTimeout { waited_secs: u64, best_len: usize },
}
