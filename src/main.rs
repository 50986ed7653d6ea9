use std::env;
use std::sync::Arc;

use agentic_rag::core::config::{AppPaths, ConfigService};
use agentic_rag::core::logging;
use agentic_rag::server;
use agentic_rag::state::AppState;
use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::from_config(ConfigService::new(paths)).await?;

    let host = state
        .config
        .load_config()
        .ok()
        .and_then(|config| {
            config
                .get("server")
                .and_then(|server| server.get("host"))
                .and_then(|value| value.as_str())
                .map(|value| value.to_string())
        })
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(0);
    let bind_addr = format!("{}:{}", host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("AGENTIC_RAG_PORT={}", addr.port());
    tracing::info!(
        "Listening on {} (tools: {:?}, max iterations: {})",
        addr,
        state.controller.available_tools(),
        state.controller.max_iterations()
    );

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
