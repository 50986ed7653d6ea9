//! Query reformulation for retry iterations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::config::LlmSettings;
use crate::llm::{ChatClient, ChatMessage, ChatRequest};
use crate::retrieval::text::query_terms;

#[async_trait]
pub trait QueryRewriter: Send + Sync {
    /// A reformulation of `query` not contained in `attempted`, if one exists.
    async fn rewrite(&self, query: &str, attempted: &[String]) -> Option<String>;
}

const TEMPLATE_SUFFIXES: [&str; 4] = ["", " overview", " explained", " definition and examples"];

/// Deterministic rewriter: keyword form of the query plus fixed suffixes.
#[derive(Debug, Clone, Default)]
pub struct TemplateRewriter;

impl TemplateRewriter {
    pub fn candidates(query: &str) -> Vec<String> {
        let terms = query_terms(query);
        let base = if terms.is_empty() {
            query.trim().to_string()
        } else {
            terms.join(" ")
        };
        if base.is_empty() {
            return Vec::new();
        }
        TEMPLATE_SUFFIXES
            .iter()
            .map(|suffix| format!("{}{}", base, suffix))
            .collect()
    }
}

#[async_trait]
impl QueryRewriter for TemplateRewriter {
    async fn rewrite(&self, query: &str, attempted: &[String]) -> Option<String> {
        Self::candidates(query)
            .into_iter()
            .find(|candidate| !was_attempted(candidate, attempted))
    }
}

pub(crate) fn was_attempted(candidate: &str, attempted: &[String]) -> bool {
    let candidate = candidate.trim();
    attempted
        .iter()
        .any(|previous| previous.trim().eq_ignore_ascii_case(candidate))
}

const REWRITER_SYSTEM_PROMPT: &str = "You rewrite search queries. Given a question and the \
queries already tried, reply with one new search query on a single line and nothing else.";

/// Asks a chat model for a new query; falls back to [`TemplateRewriter`].
pub struct LlmQueryRewriter {
    client: Arc<dyn ChatClient>,
    settings: LlmSettings,
    timeout: Duration,
    fallback: TemplateRewriter,
}

impl LlmQueryRewriter {
    pub fn new(client: Arc<dyn ChatClient>, settings: LlmSettings, timeout: Duration) -> Self {
        Self {
            client,
            settings,
            timeout,
            fallback: TemplateRewriter,
        }
    }

    async fn ask(&self, query: &str, attempted: &[String]) -> Option<String> {
        let tried = if attempted.is_empty() {
            "(none)".to_string()
        } else {
            attempted.join("\n")
        };
        let request = ChatRequest::new(vec![
            ChatMessage::system(REWRITER_SYSTEM_PROMPT),
            ChatMessage::user(format!("Question: {}\n\nAlready tried:\n{}", query, tried)),
        ])
        .with_settings(&self.settings)
        .with_max_tokens(64);

        match tokio::time::timeout(self.timeout, self.client.chat(request)).await {
            Ok(Ok(reply)) => {
                let line = reply
                    .lines()
                    .map(|line| line.trim().trim_matches('"'))
                    .find(|line| !line.is_empty())?;
                Some(line.to_string())
            }
            Ok(Err(err)) => {
                tracing::warn!("Query rewrite failed: {}", err);
                None
            }
            Err(_) => {
                tracing::warn!("Query rewrite timed out after {:?}", self.timeout);
                None
            }
        }
    }
}

#[async_trait]
impl QueryRewriter for LlmQueryRewriter {
    async fn rewrite(&self, query: &str, attempted: &[String]) -> Option<String> {
        if let Some(candidate) = self.ask(query, attempted).await {
            if !was_attempted(&candidate, attempted) {
                return Some(candidate);
            }
            tracing::debug!("Model proposed an already-tried query: {}", candidate);
        }
        self.fallback.rewrite(query, attempted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ResearchSettings;
    use crate::core::errors::ApiError;

    struct CannedChat(Result<String, String>);

    #[async_trait]
    impl ChatClient for CannedChat {
        async fn chat(&self, _request: ChatRequest) -> Result<String, ApiError> {
            self.0.clone().map_err(ApiError::Upstream)
        }
    }

    struct StalledChat;

    #[async_trait]
    impl ChatClient for StalledChat {
        async fn chat(&self, _request: ChatRequest) -> Result<String, ApiError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("never used".to_string())
        }
    }

    fn llm_settings() -> LlmSettings {
        ResearchSettings::default().llm
    }

    fn llm_rewriter(reply: Result<String, String>) -> LlmQueryRewriter {
        LlmQueryRewriter::new(
            Arc::new(CannedChat(reply)),
            llm_settings(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn template_starts_with_keyword_form() {
        let rewritten = TemplateRewriter
            .rewrite("What is quantum computing?", &["What is quantum computing?".to_string()])
            .await;
        assert_eq!(rewritten.as_deref(), Some("quantum computing"));
    }

    #[tokio::test]
    async fn template_skips_attempted_candidates() {
        let attempted = vec![
            "What is quantum computing?".to_string(),
            "Quantum Computing".to_string(),
        ];
        let rewritten = TemplateRewriter
            .rewrite("What is quantum computing?", &attempted)
            .await;
        assert_eq!(rewritten.as_deref(), Some("quantum computing overview"));
    }

    #[tokio::test]
    async fn template_runs_out_of_candidates() {
        let attempted = TemplateRewriter::candidates("rust lifetimes");
        assert!(TemplateRewriter.rewrite("rust lifetimes", &attempted).await.is_none());
    }

    #[tokio::test]
    async fn llm_rewrite_uses_first_non_empty_line() {
        let rewriter = llm_rewriter(Ok("\n\"qubit hardware basics\"\nextra".to_string()));
        let rewritten = rewriter.rewrite("What is quantum computing?", &[]).await;
        assert_eq!(rewritten.as_deref(), Some("qubit hardware basics"));
    }

    #[tokio::test]
    async fn llm_rewrite_falls_back_on_error_or_repeat() {
        let attempted = vec!["What is quantum computing?".to_string()];

        let rewriter = llm_rewriter(Err("offline".to_string()));
        let rewritten = rewriter.rewrite("What is quantum computing?", &attempted).await;
        assert_eq!(rewritten.as_deref(), Some("quantum computing"));

        let rewriter = llm_rewriter(Ok("what is quantum computing?".to_string()));
        let rewritten = rewriter.rewrite("What is quantum computing?", &attempted).await;
        assert_eq!(rewritten.as_deref(), Some("quantum computing"));
    }

    #[tokio::test]
    async fn llm_rewrite_falls_back_on_timeout() {
        let rewriter =
            LlmQueryRewriter::new(Arc::new(StalledChat), llm_settings(), Duration::from_millis(20));
        let attempted = vec!["What is quantum computing?".to_string()];

        let started = std::time::Instant::now();
        let rewritten = rewriter.rewrite("What is quantum computing?", &attempted).await;
        assert_eq!(rewritten.as_deref(), Some("quantum computing"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
