use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;
use super::provider::ChatClient;
use super::types::ChatRequest;

/// Client for any server exposing `/v1/chat/completions`
/// (llama.cpp server, LM Studio, Ollama, OpenAI).
#[derive(Clone)]
pub struct OpenAiCompatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            client: Client::new(),
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        let mut client = Self::new(settings.base_url.clone(), settings.model.clone());
        client.api_key = settings.api_key.clone();
        client
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatClient {
    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
        }

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder.send().await.map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "LLM request failed: {} {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        extract_content(&payload)
            .ok_or_else(|| ApiError::Upstream("LLM response has no message content".to_string()))
    }
}

/// Pull the completion text out of a chat (or legacy completion) payload.
fn extract_content(payload: &Value) -> Option<String> {
    let choice = payload
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())?;

    choice
        .get("message")
        .and_then(|msg| msg.get("content"))
        .and_then(|v| v.as_str())
        .or_else(|| choice.get("text").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;
    use axum::routing::post;
    use axum::{Json, Router};

    #[test]
    fn extract_content_reads_chat_and_completion_shapes() {
        let chat = json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]});
        assert_eq!(extract_content(&chat).as_deref(), Some("hi"));

        let completion = json!({"choices": [{"text": "legacy"}]});
        assert_eq!(extract_content(&completion).as_deref(), Some("legacy"));

        assert!(extract_content(&json!({"choices": []})).is_none());
        assert!(extract_content(&json!({})).is_none());
    }

    async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn chat_posts_messages_and_returns_content() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let last = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
                let model = body["model"].as_str().unwrap_or("").to_string();
                Json(json!({
                    "choices": [{"message": {"content": format!("{}:{}", model, last)}}]
                }))
            }),
        );
        let base_url = spawn_stub(app).await;

        let client = OpenAiCompatClient::new(format!("{}/", base_url), "stub-model");
        let request = ChatRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("ping"),
        ]);
        let reply = client.chat(request).await.expect("chat succeeds");
        assert_eq!(reply, "stub-model:ping");
    }

    #[tokio::test]
    async fn chat_maps_http_errors_to_upstream() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "loading") }),
        );
        let base_url = spawn_stub(app).await;

        let client = OpenAiCompatClient::new(base_url, "m");
        let err = client
            .chat(ChatRequest::new(vec![ChatMessage::user("q")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(ref msg) if msg.contains("503")));
    }
}
