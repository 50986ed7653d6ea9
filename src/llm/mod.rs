pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiCompatClient;
pub use provider::ChatClient;
pub use types::{ChatMessage, ChatRequest};
