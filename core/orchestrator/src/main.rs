use anyhow::Result;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber;
use workstream_memory::http::{self as memory_http, MemoryState};
use workstream_memory::{AssetStore, MemoryJournal, MemoryService};
use workstream_orchestrator::http::{self as orchestrator_http, OrchestratorState};
use workstream_orchestrator::{backend_from_env, ActionOrchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Workstream Memory Layer v0.1.0");

    // Initialize the durable journal
    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "data/workstream.db".to_string());
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let journal = MemoryJournal::new(&db_path)?;
    info!("Journal initialized at: {}", db_path);

    let memory = Arc::new(MemoryService::new(journal));
    let assets = Arc::new(AssetStore::from_env());

    let reasoning = backend_from_env();
    if reasoning.is_none() {
        info!("Reasoning tier disabled; running on deterministic fallbacks");
    }

    let orchestrator = Arc::new(ActionOrchestrator::new(
        memory.clone(),
        reasoning,
        assets.clone(),
    ));

    // Build router: memory routes plus orchestrator routes
    let app = memory_http::router(MemoryState {
        service: memory.clone(),
    })
    .merge(orchestrator_http::router(OrchestratorState {
        memory,
        orchestrator,
        assets,
    }))
    .layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:21970".to_string());
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
