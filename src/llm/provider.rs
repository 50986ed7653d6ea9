use async_trait::async_trait;

use crate::core::errors::ApiError;
use super::types::ChatRequest;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError>;
}
