//! HTTP transport for the PDF question-answering pipeline.
//!
//! Routes:
//! - `POST /upload-pdfs?collection=<name>`: multipart `files`, ingests every PDF
//! - `POST /ask`: `{"question": "...", "collection": "..."}`, answers from the collection
//! - `GET /health`

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ServerConfig, VectorBackend};
pub use error::ApiError;
pub use routes::app_router;
pub use state::AppState;

/// Bind `config.bind_addr` and serve until ctrl-c.
pub async fn run_server(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state, config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("pdfqa-server listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
