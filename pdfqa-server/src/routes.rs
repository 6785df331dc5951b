//! Request handlers and router.

use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use pdfqa_rag::UploadedFile;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the uploaded PDFs.
const FILES_FIELD: &str = "files";

#[derive(Debug, Default, Deserialize)]
pub struct CollectionQuery {
    pub collection: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub collection: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

pub fn app_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/upload-pdfs", post(upload_pdfs))
        .route("/ask", post(ask))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn collection_or_default(state: &AppState, requested: Option<String>) -> String {
    requested.filter(|c| !c.trim().is_empty()).unwrap_or_else(|| state.default_collection.clone())
}

async fn upload_pdfs(
    State(state): State<AppState>,
    Query(query): Query<CollectionQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let collection = collection_or_default(&state, query.collection);

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read multipart body: {e}")))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}.pdf", files.len() + 1));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read '{filename}': {e}")))?;
        files.push(UploadedFile::new(filename, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest(format!("no '{FILES_FIELD}' field in upload")));
    }

    info!(collection = %collection, file_count = files.len(), "upload received");
    let report = state.context.ingest(&files, &collection).await?;

    Ok(Json(UploadResponse {
        message: "PDFs processed successfully".to_string(),
        documents: report.documents,
        chunks: report.chunks,
    }))
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }
    let collection = collection_or_default(&state, request.collection);

    let answer = state.context.ask(&request.question, &collection).await?;
    Ok(Json(AskResponse { answer }))
}
