//! Answer synthesis from accumulated documents.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::ResearchError;
use super::types::RetrievedDocument;
use crate::core::config::{LlmSettings, SynthesizerSettings};
use crate::llm::{ChatClient, ChatMessage, ChatRequest};
use crate::retrieval::text::truncate_chars;

/// Answer returned when no document was retrieved.
pub const INSUFFICIENT_INFORMATION: &str =
    "I could not find sufficient information in the available sources to answer this question.";

/// Prefix of the answer when the generator call fails.
pub const SYNTHESIS_FAILED: &str = "Answer generation failed";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// `context` is the numbered document block built by [`Synthesizer::build_context`].
    async fn generate(
        &self,
        query: &str,
        context: &str,
        documents: &[RetrievedDocument],
    ) -> Result<String, ResearchError>;
}

pub struct Synthesizer {
    generator: Arc<dyn AnswerGenerator>,
    timeout: Duration,
    settings: SynthesizerSettings,
}

impl Synthesizer {
    pub fn new(
        generator: Arc<dyn AnswerGenerator>,
        timeout: Duration,
        settings: SynthesizerSettings,
    ) -> Self {
        Self {
            generator,
            timeout,
            settings,
        }
    }

    /// Produce the final answer.
    ///
    /// Zero documents return [`INSUFFICIENT_INFORMATION`] without calling the
    /// generator.
    pub async fn synthesize(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
    ) -> Result<String, ResearchError> {
        if documents.is_empty() {
            return Ok(INSUFFICIENT_INFORMATION.to_string());
        }

        let context = self.build_context(documents);
        let answer = tokio::time::timeout(
            self.timeout,
            self.generator.generate(query, &context, documents),
        )
        .await
        .map_err(|_| ResearchError::synthesis(format!("timed out after {:?}", self.timeout)))??;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ResearchError::synthesis("generator returned an empty answer"));
        }
        Ok(answer.to_string())
    }

    /// Numbered context block, most relevant first, capped at `max_context_chars`.
    pub fn build_context(&self, documents: &[RetrievedDocument]) -> String {
        let mut ranked: Vec<&RetrievedDocument> = documents.iter().collect();
        ranked.sort_by(|a, b| {
            b.relevance_score()
                .partial_cmp(&a.relevance_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let budget = self.settings.max_context_chars;
        let mut context = String::new();
        let mut used = 0;

        for (idx, doc) in ranked.into_iter().enumerate() {
            let block = if self.settings.include_citations {
                format!("[{}] (source: {})\n{}", idx + 1, doc.source_label(), doc.content())
            } else {
                format!("[{}]\n{}", idx + 1, doc.content())
            };
            let separator = if context.is_empty() { 0 } else { 2 };
            let block_chars = block.chars().count();

            if used + separator + block_chars > budget {
                if context.is_empty() {
                    context.push_str(truncate_chars(&block, budget));
                }
                break;
            }
            if separator > 0 {
                context.push_str("\n\n");
            }
            context.push_str(&block);
            used += separator + block_chars;
        }

        context
    }
}

const ANSWER_SYSTEM_PROMPT: &str = "Answer the question using only the numbered context \
documents. Cite documents as [n]. If the context does not contain the answer, say that the \
available sources are insufficient. Do not use outside knowledge.";

pub struct LlmAnswerGenerator {
    client: Arc<dyn ChatClient>,
    settings: LlmSettings,
}

impl LlmAnswerGenerator {
    pub fn new(client: Arc<dyn ChatClient>, settings: LlmSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(
        &self,
        query: &str,
        context: &str,
        _documents: &[RetrievedDocument],
    ) -> Result<String, ResearchError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(ANSWER_SYSTEM_PROMPT),
            ChatMessage::user(format!("Context:\n{}\n\nQuestion: {}", context, query)),
        ])
        .with_settings(&self.settings);

        self.client
            .chat(request)
            .await
            .map_err(ResearchError::synthesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the context so tests can see what the generator received.
    struct EchoGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(
            &self,
            query: &str,
            context: &str,
            _documents: &[RetrievedDocument],
        ) -> Result<String, ResearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} => {}", query, context))
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl AnswerGenerator for FailingGenerator {
        async fn generate(
            &self,
            _: &str,
            _: &str,
            _: &[RetrievedDocument],
        ) -> Result<String, ResearchError> {
            Err(ResearchError::synthesis("model offline"))
        }
    }

    struct SleepyGenerator(Duration);

    #[async_trait]
    impl AnswerGenerator for SleepyGenerator {
        async fn generate(
            &self,
            _: &str,
            _: &str,
            _: &[RetrievedDocument],
        ) -> Result<String, ResearchError> {
            tokio::time::sleep(self.0).await;
            Ok("too late".to_string())
        }
    }

    fn synthesizer_with(
        generator: Arc<dyn AnswerGenerator>,
        max_context_chars: usize,
    ) -> Synthesizer {
        Synthesizer::new(
            generator,
            Duration::from_secs(1),
            SynthesizerSettings {
                max_context_chars,
                include_citations: true,
            },
        )
    }

    fn echo() -> Arc<EchoGenerator> {
        Arc::new(EchoGenerator {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn empty_documents_return_fixed_message_without_generator() {
        let generator = echo();
        let synthesizer = synthesizer_with(generator.clone(), 1000);

        let answer = synthesizer.synthesize("q", &[]).await.expect("answer");
        assert_eq!(answer, INSUFFICIENT_INFORMATION);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn context_orders_by_relevance_and_cites_sources() {
        let synthesizer = synthesizer_with(echo(), 1000);
        let docs = vec![
            RetrievedDocument::new("second", 0.4).with_metadata("url", "https://b"),
            RetrievedDocument::new("first", 0.9).with_metadata("source", "a.md"),
            RetrievedDocument::new("third", 0.4),
        ];

        let context = synthesizer.build_context(&docs);
        assert_eq!(
            context,
            concat!(
                "[1] (source: a.md)\nfirst\n\n",
                "[2] (source: https://b)\nsecond\n\n",
                "[3] (source: unknown)\nthird"
            )
        );
    }

    #[test]
    fn context_drops_documents_past_budget() {
        let synthesizer = synthesizer_with(echo(), 40);
        let docs = vec![
            RetrievedDocument::new("alpha", 0.9).with_metadata("source", "a"),
            RetrievedDocument::new("beta beta beta beta", 0.5).with_metadata("source", "b"),
        ];

        assert_eq!(synthesizer.build_context(&docs), "[1] (source: a)\nalpha");
    }

    #[test]
    fn oversized_first_document_is_truncated() {
        let synthesizer = synthesizer_with(echo(), 20);
        let docs = vec![RetrievedDocument::new("x".repeat(100), 0.9).with_metadata("source", "a")];

        let context = synthesizer.build_context(&docs);
        assert_eq!(context.chars().count(), 20);
        assert!(context.starts_with("[1] (source: a)"));
    }

    #[tokio::test]
    async fn synthesis_is_idempotent_with_deterministic_generator() {
        let synthesizer = synthesizer_with(echo(), 1000);
        let docs = vec![RetrievedDocument::new("Agentic AI plans and acts.", 0.8)];

        let first = synthesizer.synthesize("q", &docs).await.expect("first");
        let second = synthesizer.synthesize("q", &docs).await.expect("second");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn generator_failure_is_synthesis_failure() {
        let synthesizer = synthesizer_with(Arc::new(FailingGenerator), 1000);
        let docs = vec![RetrievedDocument::new("doc", 0.8)];

        let err = synthesizer.synthesize("q", &docs).await.unwrap_err();
        assert!(matches!(err, ResearchError::SynthesisFailure(_)));
    }

    #[tokio::test]
    async fn slow_generator_times_out_as_synthesis_failure() {
        let synthesizer = Synthesizer::new(
            Arc::new(SleepyGenerator(Duration::from_millis(500))),
            Duration::from_millis(20),
            SynthesizerSettings {
                max_context_chars: 1000,
                include_citations: true,
            },
        );
        let docs = vec![RetrievedDocument::new("doc", 0.8)];

        match synthesizer.synthesize("q", &docs).await {
            Err(ResearchError::SynthesisFailure(message)) => {
                assert!(message.starts_with("timed out"), "{}", message)
            }
            other => panic!("expected synthesis timeout, got {:?}", other),
        }
    }
}
