use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, ResearchSettings};
use crate::llm::{ChatClient, OpenAiCompatClient};
use crate::research::{
    IterationController, LlmAnswerGenerator, LlmQueryRewriter, LlmRelevanceScorer,
    QueryRewriter, TemplateRewriter, Toolbox,
};
use crate::retrieval::{LocalDocumentRetriever, Retriever, WebSearchRetriever};

pub mod active;
pub mod error;

pub use active::{ActiveRequest, ActiveResearch};
use error::InitializationError;

/// Application state shared across all routes.
///
/// Contains references to:
/// - Configuration and paths
/// - The research controller and its collaborators
/// - Cancellation tokens of in-flight requests
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: ResearchSettings,
    pub controller: Arc<IterationController>,
    pub active: ActiveResearch,
}

impl AppState {
    /// Builds state from an explicit config service.
    ///
    /// This process includes:
    /// 1. Loading and validating configuration
    /// 2. Indexing the local corpus
    /// 3. Wiring the web retriever and LLM-backed collaborators
    pub async fn from_config(config: ConfigService) -> Result<Arc<Self>, InitializationError> {
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let corpus_dir = config.paths().resolve(&settings.local.corpus_dir);
        let local_settings = settings.local.clone();
        let local = tokio::task::spawn_blocking(move || {
            LocalDocumentRetriever::from_dir(local_settings, &corpus_dir)
        })
        .await
        .map_err(|e| InitializationError::Corpus(e.into()))?
        .map_err(|e| InitializationError::Corpus(e.into()))?;

        let web: Option<Arc<dyn Retriever>> = if settings.web.enabled {
            Some(Arc::new(WebSearchRetriever::new(settings.web.clone())))
        } else {
            tracing::info!("Web search disabled");
            None
        };

        let client: Arc<dyn ChatClient> =
            Arc::new(OpenAiCompatClient::from_settings(&settings.llm));
        let rewriter: Arc<dyn QueryRewriter> = if settings.strategy.llm_rewrite {
            Arc::new(LlmQueryRewriter::new(
                client.clone(),
                settings.llm.clone(),
                settings.per_call_timeout(),
            ))
        } else {
            Arc::new(TemplateRewriter)
        };

        let controller = IterationController::from_settings(
            &settings,
            Toolbox::new(Arc::new(local), web),
            Arc::new(LlmRelevanceScorer::new(client.clone(), settings.llm.clone())),
            rewriter,
            Arc::new(LlmAnswerGenerator::new(client, settings.llm.clone())),
        );

        Ok(Self::new(config, settings, controller))
    }

    /// Assembles state around an already-built controller.
    pub fn new(
        config: ConfigService,
        settings: ResearchSettings,
        controller: IterationController,
    ) -> Arc<Self> {
        Arc::new(AppState {
            paths: Arc::new(config.paths().clone()),
            config,
            settings,
            controller: Arc::new(controller),
            active: ActiveResearch::new(),
        })
    }
}
