pub mod core;
pub mod llm;
pub mod research;
pub mod retrieval;
pub mod server;
pub mod state;
