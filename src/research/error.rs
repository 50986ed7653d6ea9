use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy of one research invocation.
///
/// Retrieval and evaluation failures are absorbed inside the loop and only
/// show up in the reasoning trace; `InvalidQuery` and `SynthesisFailure` are
/// attached to the returned `ResearchResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ResearchError {
    #[error("retrieval failed: {0}")]
    RetrievalFailure(String),

    #[error("evaluation failed: {0}")]
    EvaluationFailure(String),

    #[error("answer synthesis failed: {0}")]
    SynthesisFailure(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("research cancelled")]
    Cancelled,
}

impl ResearchError {
    pub fn retrieval<E: std::fmt::Display>(err: E) -> Self {
        Self::RetrievalFailure(err.to_string())
    }

    pub fn evaluation<E: std::fmt::Display>(err: E) -> Self {
        Self::EvaluationFailure(err.to_string())
    }

    pub fn synthesis<E: std::fmt::Display>(err: E) -> Self {
        Self::SynthesisFailure(err.to_string())
    }
}
