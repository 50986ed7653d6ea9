//! Retriever trait: the seam between the research loop and search backends.

use async_trait::async_trait;
use serde::Serialize;

use crate::research::types::RetrievedDocument;

/// Result of one retrieval call.
///
/// Failures are data, not errors: the research loop records them and moves on.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub success: bool,
    pub documents: Vec<RetrievedDocument>,
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn ok(documents: Vec<RetrievedDocument>) -> Self {
        Self {
            success: true,
            documents,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            documents: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Name for logs and trace observations.
    fn name(&self) -> &str;

    /// Search for documents relevant to `query`.
    async fn search(&self, query: &str) -> SearchOutcome;
}
