//! Strategy selection: which tool and query the next iteration uses.

use std::sync::Arc;

use super::rewriter::{was_attempted, QueryRewriter};
use super::types::{IterationRecord, StopReason, ToolId};
use crate::core::config::StrategySettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    Retry { tool: ToolId, query: String },
    StopEarly(StopReason),
}

pub struct StrategySelector {
    settings: StrategySettings,
    rewriter: Arc<dyn QueryRewriter>,
}

impl StrategySelector {
    pub fn new(settings: StrategySettings, rewriter: Arc<dyn QueryRewriter>) -> Self {
        Self { settings, rewriter }
    }

    /// First iteration: the requested tool if available, else the primary one.
    pub fn initial_action(
        &self,
        query: &str,
        tools: &[ToolId],
        requested: Option<ToolId>,
    ) -> NextAction {
        let tool = requested
            .filter(|tool| tools.contains(tool))
            .or_else(|| tools.first().copied());
        match tool {
            Some(tool) => NextAction::Retry {
                tool,
                query: query.to_string(),
            },
            None => NextAction::StopEarly(StopReason::NoTools),
        }
    }

    /// Decide the action after an insufficient iteration.
    ///
    /// Never returns the `(tool, query)` pair of the last record.
    pub async fn next_action(
        &self,
        query: &str,
        history: &[IterationRecord],
        tools: &[ToolId],
    ) -> NextAction {
        if tools.is_empty() {
            return NextAction::StopEarly(StopReason::NoTools);
        }
        let Some(last) = history.last() else {
            return self.initial_action(query, tools, None);
        };

        if self.stalled(history) {
            return NextAction::StopEarly(StopReason::NoNewDocuments);
        }
        if self.plateaued(history, tools) {
            return NextAction::StopEarly(StopReason::ScorePlateau);
        }

        let tool = if self.unproductive(last) || !tools.contains(&last.chosen_tool) {
            rotate(last.chosen_tool, tools)
        } else {
            last.chosen_tool
        };

        let attempted: Vec<String> = history
            .iter()
            .filter(|record| record.chosen_tool == tool)
            .map(|record| record.attempt_query.clone())
            .collect();

        let candidate = if tool != last.chosen_tool && !was_attempted(query, &attempted) {
            Some(query.to_string())
        } else {
            self.rewriter.rewrite(query, &attempted).await
        };

        match candidate {
            Some(candidate)
                if !(tool == last.chosen_tool
                    && was_attempted(&candidate, std::slice::from_ref(&last.attempt_query))) =>
            {
                tracing::debug!("Next attempt: {} with '{}'", tool, candidate);
                NextAction::Retry {
                    tool,
                    query: candidate,
                }
            }
            _ => NextAction::StopEarly(StopReason::RepeatedAttempt),
        }
    }

    /// Zero new documents, a failed call, or only weak matches.
    fn unproductive(&self, record: &IterationRecord) -> bool {
        !record.retrieval_succeeded
            || record.new_documents == 0
            || record.top_relevance < self.settings.low_relevance_threshold
    }

    /// The last `stall_window` retrievals all succeeded and added nothing.
    fn stalled(&self, history: &[IterationRecord]) -> bool {
        let window = self.settings.stall_window;
        if window == 0 || history.len() < window {
            return false;
        }
        history[history.len() - window..]
            .iter()
            .all(|record| record.retrieval_succeeded && record.new_documents == 0)
    }

    /// Every tool tried and best relevance flat over `plateau_window` iterations.
    fn plateaued(&self, history: &[IterationRecord], tools: &[ToolId]) -> bool {
        let window = self.settings.plateau_window;
        if window == 0 || history.len() <= window {
            return false;
        }
        let all_tried = tools
            .iter()
            .all(|tool| history.iter().any(|record| record.chosen_tool == *tool));
        if !all_tried {
            return false;
        }
        let latest = history[history.len() - 1].best_relevance;
        let earlier = history[history.len() - 1 - window].best_relevance;
        latest <= earlier + self.settings.min_improvement
    }
}

fn rotate(current: ToolId, tools: &[ToolId]) -> ToolId {
    match tools.iter().position(|tool| *tool == current) {
        Some(pos) => tools[(pos + 1) % tools.len()],
        None => tools[0],
    }
}
