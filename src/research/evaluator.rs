//! Sufficiency evaluation.
//!
//! The numeric score comes from a [`RelevanceScorer`]; the threshold rule
//! and every failure fallback live here.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use super::error::ResearchError;
use super::types::{EvaluationVerdict, RetrievedDocument};
use crate::core::config::{EvaluatorSettings, LlmSettings};
use crate::llm::{ChatClient, ChatMessage, ChatRequest};

/// Raw scorer output, before clamping and thresholding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawScore {
    pub score: i64,
    pub rationale: String,
}

#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
    ) -> Result<RawScore, ResearchError>;
}

pub struct Evaluator {
    scorer: Arc<dyn RelevanceScorer>,
    threshold: u8,
    timeout: Duration,
    settings: EvaluatorSettings,
}

impl Evaluator {
    pub fn new(
        scorer: Arc<dyn RelevanceScorer>,
        threshold: u8,
        timeout: Duration,
        settings: EvaluatorSettings,
    ) -> Self {
        Self {
            scorer,
            threshold: threshold.min(EvaluationVerdict::MAX_SCORE),
            timeout,
            settings,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Judge whether `documents` suffice to answer `query`.
    ///
    /// Never fails: scorer errors, timeouts and empty input all produce an
    /// insufficient verdict.
    pub async fn evaluate(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
    ) -> EvaluationVerdict {
        if documents.is_empty() {
            return EvaluationVerdict::from_score(
                0,
                self.threshold.max(1),
                "no documents retrieved",
            );
        }

        let prepared = self.prepare(documents);
        let scored = tokio::time::timeout(self.timeout, self.scorer.score(query, &prepared)).await;
        let raw = match scored {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                tracing::warn!("Relevance scoring failed: {}", err);
                return EvaluationVerdict::failed();
            }
            Err(_) => {
                tracing::warn!("Relevance scoring timed out after {:?}", self.timeout);
                return EvaluationVerdict::failed();
            }
        };

        let max = i64::from(EvaluationVerdict::MAX_SCORE);
        let score = raw.score.clamp(0, max);
        if score != raw.score {
            tracing::warn!(
                "Scorer returned out-of-range score {}; clamped to {}",
                raw.score,
                score
            );
        }
        tracing::debug!("Evaluation score {} for {} documents", score, prepared.len());

        EvaluationVerdict::from_score(score as u8, self.threshold, raw.rationale)
    }

    /// Top documents by relevance, each cut to the configured length.
    fn prepare(&self, documents: &[RetrievedDocument]) -> Vec<RetrievedDocument> {
        let mut ranked: Vec<&RetrievedDocument> = documents.iter().collect();
        ranked.sort_by(|a, b| {
            b.relevance_score()
                .partial_cmp(&a.relevance_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
            .into_iter()
            .take(self.settings.max_documents.max(1))
            .map(|doc| doc.truncated(self.settings.max_document_chars))
            .collect()
    }
}

const SCORER_SYSTEM_PROMPT: &str = "You grade whether retrieved documents contain enough \
information to answer a question. Reply with JSON only: \
{\"score\": <integer 0-10>, \"rationale\": \"<one sentence>\"}. \
0 means the documents are irrelevant, 10 means they fully answer the question.";

/// Scores documents by asking a chat model for structured JSON.
pub struct LlmRelevanceScorer {
    client: Arc<dyn ChatClient>,
    settings: LlmSettings,
}

impl LlmRelevanceScorer {
    pub fn new(client: Arc<dyn ChatClient>, settings: LlmSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl RelevanceScorer for LlmRelevanceScorer {
    async fn score(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
    ) -> Result<RawScore, ResearchError> {
        let mut listing = String::new();
        for (idx, doc) in documents.iter().enumerate() {
            listing.push_str(&format!("[{}] {}\n\n", idx + 1, doc.content()));
        }

        let request = ChatRequest::new(vec![
            ChatMessage::system(SCORER_SYSTEM_PROMPT),
            ChatMessage::user(format!("Question: {}\n\nDocuments:\n{}", query, listing.trim_end())),
        ])
        .with_settings(&self.settings)
        .with_max_tokens(200);

        let reply = self
            .client
            .chat(request)
            .await
            .map_err(ResearchError::evaluation)?;

        parse_score(&reply).ok_or_else(|| {
            ResearchError::evaluation(format!("unparseable score: {}", reply.trim()))
        })
    }
}

/// Read a score from model output.
///
/// Accepts a JSON object, a JSON object embedded in prose, or
/// `score: N` / `N/10` text.
pub fn parse_score(text: &str) -> Option<RawScore> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(raw) = score_from_json(&value) {
            return Some(raw);
        }
    }

    if let Some(found) = embedded_json_regex().and_then(|re| re.find(trimmed)) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            if let Some(raw) = score_from_json(&value) {
                return Some(raw);
            }
        }
    }

    if let Some(caps) = textual_score_regex().and_then(|re| re.captures(trimmed)) {
        let number = caps.get(1).or_else(|| caps.get(2))?;
        let score = number.as_str().parse::<f64>().ok()?;
        return Some(RawScore {
            score: score.round() as i64,
            rationale: trimmed.to_string(),
        });
    }

    #[cfg(feature = "hedge-heuristic")]
    {
        if let Some(raw) = hedge_confidence(trimmed) {
            return Some(raw);
        }
    }

    None
}

fn score_from_json(value: &Value) -> Option<RawScore> {
    let field = value.get("score")?;
    let score = match field {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))?,
        Value::String(s) => s.trim().parse::<f64>().ok()?.round() as i64,
        _ => return None,
    };
    let rationale = value
        .get("rationale")
        .or_else(|| value.get("reason"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    Some(RawScore { score, rationale })
}

fn embedded_json_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").ok()).as_ref()
}

fn textual_score_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)score\s*(?:is)?\s*[:=]?\s*(-?\d+(?:\.\d+)?)",
            r"|(-?\d+(?:\.\d+)?)\s*/\s*10\b",
        ))
        .ok()
    })
    .as_ref()
}

#[cfg(feature = "hedge-heuristic")]
const HEDGE_PHRASES: [&str; 8] = [
    "might",
    "maybe",
    "perhaps",
    "possibly",
    "unclear",
    "not sure",
    "uncertain",
    "partially",
];

/// Confidence estimate from hedging language, used when no number is found.
#[cfg(feature = "hedge-heuristic")]
fn hedge_confidence(text: &str) -> Option<RawScore> {
    let lowered = text.to_lowercase();
    let hedges: i64 = HEDGE_PHRASES
        .iter()
        .map(|phrase| lowered.matches(phrase).count() as i64)
        .sum();
    Some(RawScore {
        score: (8 - 2 * hedges).max(0),
        rationale: format!("estimated from {} hedging phrases", hedges),
    })
}
