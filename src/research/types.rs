// Research Types
// Documents, verdicts, trace records and the final result of one research run

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ResearchError;
use crate::retrieval::text::truncate_chars;

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 4_000;

/// Retrieval tools the controller can dispatch to.
///
/// Closed set: adding a retriever means adding a variant and a `Toolbox` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    LocalDocuments,
    WebSearch,
}

impl ToolId {
    /// Rotation order; the first entry is the primary retriever.
    pub const ALL: [ToolId; 2] = [ToolId::LocalDocuments, ToolId::WebSearch];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::LocalDocuments => "local_documents",
            ToolId::WebSearch => "web_search",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolId::LocalDocuments => "local documents",
            ToolId::WebSearch => "the web",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local_documents" | "local" => Some(ToolId::LocalDocuments),
            "web_search" | "web" => Some(ToolId::WebSearch),
            _ => None,
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document returned by a retrieval collaborator.
///
/// Fields are private so a document cannot change after construction;
/// `relevance_score` is clamped into `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    content: String,
    source_metadata: BTreeMap<String, String>,
    relevance_score: f32,
}

impl RetrievedDocument {
    pub fn new(content: impl Into<String>, relevance_score: f32) -> Self {
        Self {
            content: content.into(),
            source_metadata: BTreeMap::new(),
            relevance_score: clamp_relevance(relevance_score),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.source_metadata.insert(key.into(), value.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source_metadata(&self) -> &BTreeMap<String, String> {
        &self.source_metadata
    }

    pub fn relevance_score(&self) -> f32 {
        self.relevance_score
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.source_metadata.get(key).map(|s| s.as_str())
    }

    /// Copy with `content` cut to at most `max_chars` characters.
    pub fn truncated(&self, max_chars: usize) -> Self {
        Self {
            content: truncate_chars(&self.content, max_chars).to_string(),
            source_metadata: self.source_metadata.clone(),
            relevance_score: self.relevance_score,
        }
    }

    /// Best human-readable origin: source path, url, then title.
    pub fn source_label(&self) -> &str {
        self.metadata("source")
            .or_else(|| self.metadata("url"))
            .or_else(|| self.metadata("title"))
            .unwrap_or("unknown")
    }
}

fn clamp_relevance(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Sufficiency judgement for the documents accumulated so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub score: u8,
    pub is_sufficient: bool,
    pub rationale: String,
}

impl EvaluationVerdict {
    pub const MAX_SCORE: u8 = 10;
    pub const FAILED_RATIONALE: &'static str = "evaluation failed";

    /// Apply the threshold rule: sufficient iff `score >= threshold`.
    pub fn from_score(score: u8, threshold: u8, rationale: impl Into<String>) -> Self {
        let score = score.min(Self::MAX_SCORE);
        Self {
            score,
            is_sufficient: score >= threshold,
            rationale: rationale.into(),
        }
    }

    pub fn failed() -> Self {
        Self {
            score: 0,
            is_sufficient: false,
            rationale: Self::FAILED_RATIONALE.to_string(),
        }
    }
}

/// One pass of the retrieve-evaluate-decide loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration_number: usize,
    pub thought: String,
    pub chosen_tool: ToolId,
    pub attempt_query: String,
    pub observation: String,
    pub reflection: String,
    pub evaluation: Option<EvaluationVerdict>,
    pub retrieval_succeeded: bool,
    /// Highest relevance among the documents this iteration retrieved.
    pub top_relevance: f32,
    /// Documents this iteration added after deduplication.
    pub new_documents: usize,
    /// Highest relevance across all documents accumulated so far.
    pub best_relevance: f32,
    pub elapsed_ms: u64,
}

impl IterationRecord {
    pub fn is_sufficient(&self) -> bool {
        self.evaluation
            .as_ref()
            .map(|v| v.is_sufficient)
            .unwrap_or(false)
    }

    pub fn score(&self) -> u8 {
        self.evaluation.as_ref().map(|v| v.score).unwrap_or(0)
    }
}

/// Why a research run stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Best relevance stopped improving after every tool was tried.
    ScorePlateau,
    /// Several successful retrievals in a row added nothing new.
    NoNewDocuments,
    /// The only candidate attempt would repeat the previous one.
    RepeatedAttempt,
    /// No retrieval tool is available.
    NoTools,
}

impl StopReason {
    pub fn describe(&self) -> &'static str {
        match self {
            StopReason::ScorePlateau => "no relevance improvement after trying every tool",
            StopReason::NoNewDocuments => "recent searches found no new documents",
            StopReason::RepeatedAttempt => "no untried query left for the selected tool",
            StopReason::NoTools => "no retrieval tool is available",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum TerminationReason {
    Sufficient,
    StopEarly(StopReason),
    BudgetExhausted,
    Cancelled,
    InvalidQuery,
}

/// Terminal output of one controller invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchResult {
    pub request_id: String,
    pub answer: String,
    pub success: bool,
    pub iterations: usize,
    pub terminated_by: TerminationReason,
    pub documents_used: Vec<RetrievedDocument>,
    pub reasoning_trace: Vec<IterationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResearchError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Reject empty or oversized queries before any retrieval happens.
///
/// Returns the trimmed query on success.
pub fn validate_query(query: &str) -> Result<&str, ResearchError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ResearchError::InvalidQuery("query is empty".to_string()));
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err(ResearchError::InvalidQuery(format!(
            "query exceeds {} characters",
            MAX_QUERY_CHARS
        )));
    }
    if trimmed.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return Err(ResearchError::InvalidQuery(
            "query contains control characters".to_string(),
        ));
    }
    Ok(trimmed)
}
