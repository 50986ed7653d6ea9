//! The bounded retrieve-evaluate-decide loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::error::ResearchError;
use super::evaluator::{Evaluator, RelevanceScorer};
use super::rewriter::QueryRewriter;
use super::strategy::{NextAction, StrategySelector};
use super::synthesizer::{AnswerGenerator, Synthesizer, SYNTHESIS_FAILED};
use super::toolbox::Toolbox;
use super::types::{
    validate_query, EvaluationVerdict, IterationRecord, ResearchResult, RetrievedDocument,
    TerminationReason, ToolId,
};
use crate::core::config::ResearchSettings;
use crate::retrieval::SearchOutcome;

/// Answer returned when a run is cancelled before synthesis.
pub const CANCELLED_ANSWER: &str = "Research was cancelled before an answer was produced.";

/// Per-invocation options owned by the caller.
#[derive(Debug, Clone)]
pub struct ResearchContext {
    pub request_id: String,
    pub cancellation: CancellationToken,
    pub first_tool: Option<ToolId>,
    pub max_iterations: Option<usize>,
}

impl ResearchContext {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            cancellation: CancellationToken::new(),
            first_tool: None,
            max_iterations: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_first_tool(mut self, tool: ToolId) -> Self {
        self.first_tool = Some(tool);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

impl Default for ResearchContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one research run per [`research`](Self::research) call.
///
/// Holds only immutable collaborators, so one controller serves many
/// concurrent queries.
pub struct IterationController {
    toolbox: Toolbox,
    evaluator: Evaluator,
    selector: StrategySelector,
    synthesizer: Synthesizer,
    max_iterations: usize,
    timeout: Duration,
}

impl IterationController {
    pub fn new(
        toolbox: Toolbox,
        evaluator: Evaluator,
        selector: StrategySelector,
        synthesizer: Synthesizer,
        max_iterations: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            toolbox,
            evaluator,
            selector,
            synthesizer,
            max_iterations: max_iterations.max(1),
            timeout,
        }
    }

    pub fn from_settings(
        settings: &ResearchSettings,
        toolbox: Toolbox,
        scorer: Arc<dyn RelevanceScorer>,
        rewriter: Arc<dyn QueryRewriter>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let timeout = settings.per_call_timeout();
        Self::new(
            toolbox,
            Evaluator::new(
                scorer,
                settings.evaluation_threshold,
                timeout,
                settings.evaluator.clone(),
            ),
            StrategySelector::new(settings.strategy.clone(), rewriter),
            Synthesizer::new(generator, timeout, settings.synthesizer.clone()),
            settings.max_iterations,
            timeout,
        )
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn available_tools(&self) -> Vec<ToolId> {
        self.toolbox.available()
    }

    /// Run the loop for `query`. Always returns a well-formed result.
    pub async fn research(&self, query: &str, ctx: ResearchContext) -> ResearchResult {
        let started_at = Utc::now();

        let query = match validate_query(query) {
            Ok(query) => query,
            Err(err) => {
                tracing::info!("[{}] Rejected query: {}", ctx.request_id, err);
                return ResearchResult {
                    request_id: ctx.request_id,
                    answer: err.to_string(),
                    success: false,
                    iterations: 0,
                    terminated_by: TerminationReason::InvalidQuery,
                    documents_used: Vec::new(),
                    reasoning_trace: Vec::new(),
                    error: Some(err),
                    started_at,
                    finished_at: Utc::now(),
                };
            }
        };

        let max_iterations = ctx.max_iterations.unwrap_or(self.max_iterations).max(1);
        let tools = self.toolbox.available();
        tracing::info!(
            "[{}] Research started (max {} iterations, tools: {:?})",
            ctx.request_id,
            max_iterations,
            tools
        );

        let mut accumulated: Vec<RetrievedDocument> = Vec::new();
        let mut trace: Vec<IterationRecord> = Vec::new();
        let mut action = self.selector.initial_action(query, &tools, ctx.first_tool);

        let terminated_by = loop {
            if ctx.cancellation.is_cancelled() {
                tracing::info!("[{}] Cancelled after {} iterations", ctx.request_id, trace.len());
                break TerminationReason::Cancelled;
            }

            let (tool, attempt_query) = match action {
                NextAction::Retry { tool, query } => (tool, query),
                NextAction::StopEarly(reason) => {
                    tracing::info!("[{}] Stopping early: {}", ctx.request_id, reason.describe());
                    break TerminationReason::StopEarly(reason);
                }
            };

            let iteration_number = trace.len() + 1;
            let iteration_started = Instant::now();
            let thought = describe_thought(tool, &attempt_query, query, trace.last());

            let outcome = self.retrieve(tool, &attempt_query).await;
            let retrieved = outcome.documents.len();
            let top_relevance = max_relevance(&outcome.documents);
            let observation = if outcome.success {
                format!("{} returned {} documents", tool.label(), retrieved)
            } else {
                let err =
                    ResearchError::retrieval(outcome.error.as_deref().unwrap_or("unknown error"));
                tracing::warn!("[{}] {} on {}", ctx.request_id, err, tool);
                err.to_string()
            };
            let new_documents = merge_documents(&mut accumulated, outcome.documents);

            let verdict = self.evaluator.evaluate(query, &accumulated).await;
            let reflection =
                describe_reflection(&verdict, self.evaluator.threshold(), new_documents);

            tracing::info!(
                "[{}] Iteration {}: {} '{}' -> {} new documents, score {}/10",
                ctx.request_id,
                iteration_number,
                tool,
                attempt_query,
                new_documents,
                verdict.score
            );

            let sufficient = verdict.is_sufficient;
            trace.push(IterationRecord {
                iteration_number,
                thought,
                chosen_tool: tool,
                attempt_query,
                observation,
                reflection,
                evaluation: Some(verdict),
                retrieval_succeeded: outcome.success,
                top_relevance,
                new_documents,
                best_relevance: max_relevance(&accumulated),
                elapsed_ms: iteration_started.elapsed().as_millis() as u64,
            });

            if sufficient {
                break TerminationReason::Sufficient;
            }
            if trace.len() >= max_iterations {
                break TerminationReason::BudgetExhausted;
            }

            action = self.selector.next_action(query, &trace, &tools).await;
        };

        let (answer, error) = if terminated_by == TerminationReason::Cancelled {
            (CANCELLED_ANSWER.to_string(), Some(ResearchError::Cancelled))
        } else {
            match self.synthesizer.synthesize(query, &accumulated).await {
                Ok(answer) => (answer, None),
                Err(err) => {
                    tracing::error!("[{}] {}", ctx.request_id, err);
                    (format!("{}: {}", SYNTHESIS_FAILED, err), Some(err))
                }
            }
        };

        let success = error.is_none()
            && trace
                .last()
                .map(IterationRecord::is_sufficient)
                .unwrap_or(false);

        tracing::info!(
            "[{}] Research finished: {:?} after {} iterations (success={})",
            ctx.request_id,
            terminated_by,
            trace.len(),
            success
        );

        ResearchResult {
            request_id: ctx.request_id,
            answer,
            success,
            iterations: trace.len(),
            terminated_by,
            documents_used: accumulated,
            reasoning_trace: trace,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Call one retriever under the per-call timeout.
    async fn retrieve(&self, tool: ToolId, query: &str) -> SearchOutcome {
        let Some(retriever) = self.toolbox.get(tool) else {
            return SearchOutcome::failed(format!("{} is not available", tool));
        };
        match tokio::time::timeout(self.timeout, retriever.search(query)).await {
            Ok(outcome) => outcome,
            Err(_) => SearchOutcome::failed(format!(
                "{} timed out after {:?}",
                retriever.name(),
                self.timeout
            )),
        }
    }
}

/// Append documents whose content is not already present; returns the count added.
fn merge_documents(
    accumulated: &mut Vec<RetrievedDocument>,
    documents: Vec<RetrievedDocument>,
) -> usize {
    let mut added = 0;
    for doc in documents {
        if accumulated.iter().any(|existing| existing.content() == doc.content()) {
            continue;
        }
        accumulated.push(doc);
        added += 1;
    }
    added
}

fn max_relevance(documents: &[RetrievedDocument]) -> f32 {
    documents
        .iter()
        .map(RetrievedDocument::relevance_score)
        .fold(0.0, f32::max)
}

fn describe_thought(
    tool: ToolId,
    attempt_query: &str,
    query: &str,
    previous: Option<&IterationRecord>,
) -> String {
    match previous {
        None => format!("Search {} for the question.", tool.label()),
        Some(prev) if prev.chosen_tool != tool => format!(
            "{} was not enough (score {}/10); switch to {} with '{}'.",
            prev.chosen_tool.label(),
            prev.score(),
            tool.label(),
            attempt_query
        ),
        Some(prev) if attempt_query != query => format!(
            "Score {}/10 is below target; rephrase the search of {} as '{}'.",
            prev.score(),
            tool.label(),
            attempt_query
        ),
        Some(prev) => format!(
            "Score {}/10 is below target; search {} again.",
            prev.score(),
            tool.label()
        ),
    }
}

fn describe_reflection(verdict: &EvaluationVerdict, threshold: u8, new_documents: usize) -> String {
    let status = if verdict.is_sufficient {
        "meets"
    } else {
        "is below"
    };
    format!(
        "Score {}/10 {} the threshold of {} with {} new documents. {}",
        verdict.score, status, threshold, new_documents, verdict.rationale
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_deduplicates_by_exact_content() {
        let mut accumulated = vec![RetrievedDocument::new("alpha", 0.5)];
        let added = merge_documents(
            &mut accumulated,
            vec![
                RetrievedDocument::new("alpha", 0.9),
                RetrievedDocument::new("Alpha", 0.4),
                RetrievedDocument::new("beta", 0.3),
                RetrievedDocument::new("beta", 0.3),
            ],
        );
        assert_eq!(added, 2);
        assert_eq!(accumulated.len(), 3);
        // the first copy wins
        assert_eq!(accumulated[0].relevance_score(), 0.5);
    }

    #[test]
    fn max_relevance_of_empty_is_zero() {
        assert_eq!(max_relevance(&[]), 0.0);
        assert_eq!(
            max_relevance(&[RetrievedDocument::new("a", 0.2), RetrievedDocument::new("b", 0.7)]),
            0.7
        );
    }

    #[test]
    fn context_builders_set_options() {
        let token = CancellationToken::new();
        let ctx = ResearchContext::new()
            .with_request_id("req-1")
            .with_first_tool(ToolId::WebSearch)
            .with_max_iterations(2)
            .with_cancellation(token.clone());
        token.cancel();

        assert_eq!(ctx.request_id, "req-1");
        assert_eq!(ctx.first_tool, Some(ToolId::WebSearch));
        assert_eq!(ctx.max_iterations, Some(2));
        assert!(ctx.cancellation.is_cancelled());
    }
}
