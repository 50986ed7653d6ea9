//! Web search retriever.
//!
//! Uses Brave, Bing or Google when the matching API key is configured and
//! falls back to the keyless DuckDuckGo instant-answer API otherwise.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::retriever::{Retriever, SearchOutcome};
use super::text::{query_terms, term_overlap};
use crate::core::config::WebSettings;
use crate::core::errors::ApiError;
use crate::research::types::RetrievedDocument;

const DUCKDUCKGO_ENDPOINT: &str = "https://api.duckduckgo.com/";
const GOOGLE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Weight of term overlap vs. provider rank in the relevance score.
const OVERLAP_WEIGHT: f32 = 0.7;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Clone)]
pub struct WebSearchRetriever {
    settings: WebSettings,
    client: Client,
    duckduckgo_endpoint: String,
    google_endpoint: String,
}

impl WebSearchRetriever {
    pub fn new(settings: WebSettings) -> Self {
        Self {
            settings,
            client: Client::new(),
            duckduckgo_endpoint: DUCKDUCKGO_ENDPOINT.to_string(),
            google_endpoint: GOOGLE_ENDPOINT.to_string(),
        }
    }

    /// Point the DuckDuckGo provider at another endpoint.
    pub fn with_duckduckgo_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.duckduckgo_endpoint = endpoint.into();
        self
    }

    pub fn with_google_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.google_endpoint = endpoint.into();
        self
    }

    pub async fn perform_search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let settings = &self.settings;

        match settings.provider.as_str() {
            "brave" => {
                if let Some(api_key) = &settings.brave_search_api_key {
                    return self.brave_search(query, api_key).await;
                }
            }
            "bing" => {
                if let Some(api_key) = &settings.bing_search_api_key {
                    return self.bing_search(query, api_key).await;
                }
            }
            "google" => {
                if let (Some(api_key), Some(engine_id)) = (
                    &settings.google_search_api_key,
                    &settings.google_search_engine_id,
                ) {
                    match self.google_search(query, api_key, engine_id).await {
                        Ok(results) if !results.is_empty() => return Ok(results),
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!("Google search failed, falling back: {}", err);
                        }
                    }
                }
            }
            _ => {}
        }

        self.duckduckgo_search(query).await
    }

    async fn google_search(
        &self,
        query: &str,
        api_key: &str,
        engine_id: &str,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let request = self
            .client
            .get(&self.google_endpoint)
            .query(&[("key", api_key), ("cx", engine_id), ("q", query)]);

        let payload = self.get_json(request, "Google").await?;
        let mut results = Vec::new();
        if let Some(items) = payload.get("items").and_then(|v| v.as_array()) {
            for item in items {
                push_result(&mut results, item, "title", "link", "snippet");
            }
        }
        Ok(results)
    }

    async fn duckduckgo_search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!(
            "{}?q={}&format=json&no_redirect=1&no_html=1",
            self.duckduckgo_endpoint,
            urlencoding::encode(query)
        );

        let payload = self.get_json(self.client.get(url), "DuckDuckGo").await?;
        let mut results = Vec::new();

        if let Some(abstract_text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
            if let Some(url) = payload.get("AbstractURL").and_then(|v| v.as_str()) {
                if !abstract_text.is_empty() && !url.is_empty() {
                    let heading = payload
                        .get("Heading")
                        .and_then(|v| v.as_str())
                        .filter(|h| !h.is_empty())
                        .unwrap_or_else(|| {
                            abstract_text.split(" - ").next().unwrap_or(abstract_text)
                        });
                    results.push(SearchResult {
                        title: heading.to_string(),
                        url: url.to_string(),
                        snippet: abstract_text.to_string(),
                    });
                }
            }
        }

        if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut results);
        }
        if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut results);
        }

        Ok(results)
    }

    async fn brave_search(
        &self,
        query: &str,
        api_key: &str,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!(
            "https://api.search.brave.com/res/v1/web/search?q={}",
            urlencoding::encode(query)
        );

        let request = self
            .client
            .get(url)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json");
        let payload = self.get_json(request, "Brave").await?;

        let mut results = Vec::new();
        if let Some(items) = payload
            .get("web")
            .and_then(|w| w.get("results"))
            .and_then(|v| v.as_array())
        {
            for item in items {
                push_result(&mut results, item, "title", "url", "description");
            }
        }
        Ok(results)
    }

    async fn bing_search(
        &self,
        query: &str,
        api_key: &str,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!(
            "https://api.bing.microsoft.com/v7.0/search?q={}",
            urlencoding::encode(query)
        );

        let request = self
            .client
            .get(url)
            .header("Ocp-Apim-Subscription-Key", api_key);
        let payload = self.get_json(request, "Bing").await?;

        let mut results = Vec::new();
        if let Some(items) = payload
            .get("webPages")
            .and_then(|wp| wp.get("value"))
            .and_then(|v| v.as_array())
        {
            for item in items {
                push_result(&mut results, item, "name", "url", "snippet");
            }
        }
        Ok(results)
    }

    async fn get_json(
        &self,
        request: reqwest::RequestBuilder,
        provider: &str,
    ) -> Result<Value, ApiError> {
        // reqwest errors carry the request URL, which may hold an API key
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::upstream(err.without_url()))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "{} search failed: {}",
                provider,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|err| ApiError::upstream(err.without_url()))
    }
}

#[async_trait]
impl Retriever for WebSearchRetriever {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn search(&self, query: &str) -> SearchOutcome {
        match self.perform_search(query).await {
            Ok(mut results) => {
                results.truncate(self.settings.max_results);
                SearchOutcome::ok(results_to_documents(query, results))
            }
            Err(err) => {
                tracing::warn!("Web search for '{}' failed: {}", query, err);
                SearchOutcome::failed(err.to_string())
            }
        }
    }
}

/// Convert provider results into documents scored by overlap and rank.
fn results_to_documents(query: &str, results: Vec<SearchResult>) -> Vec<RetrievedDocument> {
    let terms = query_terms(query);
    let total = results.len().max(1) as f32;

    results
        .into_iter()
        .enumerate()
        .map(|(rank, result)| {
            let content = if result.snippet.is_empty() || result.snippet == result.title {
                result.title.clone()
            } else {
                format!("{}\n{}", result.title, result.snippet)
            };
            let rank_prior = 1.0 - rank as f32 / total;
            let overlap = term_overlap(&terms, &content);
            let relevance = OVERLAP_WEIGHT * overlap + (1.0 - OVERLAP_WEIGHT) * rank_prior;

            RetrievedDocument::new(content, relevance)
                .with_metadata("title", result.title)
                .with_metadata("url", result.url)
                .with_metadata("retriever", "web")
        })
        .collect()
}

fn push_result(
    results: &mut Vec<SearchResult>,
    item: &Value,
    title_key: &str,
    url_key: &str,
    snippet_key: &str,
) {
    let title = item.get(title_key).and_then(|v| v.as_str()).unwrap_or("");
    let url = item.get(url_key).and_then(|v| v.as_str()).unwrap_or("");
    let snippet = item.get(snippet_key).and_then(|v| v.as_str()).unwrap_or("");

    if !title.is_empty() && !url.is_empty() {
        results.push(SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
        });
    }
}

fn extract_ddg_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}
