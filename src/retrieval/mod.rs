//! Retrieval collaborators.
//!
//! - `LocalDocumentRetriever`: keyword search over a chunked local corpus
//! - `WebSearchRetriever`: web search through DuckDuckGo, Brave, Bing or Google

mod local;
mod retriever;
pub(crate) mod text;
mod web;

pub use local::LocalDocumentRetriever;
pub use retriever::{Retriever, SearchOutcome};
pub use web::{SearchResult, WebSearchRetriever};
