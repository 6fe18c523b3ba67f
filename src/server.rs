//! HTTP API.
//!
//! A thin JSON adapter over ingestion and the answer service. Callers pass
//! already-extracted lecture text and an already-authenticated user id.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Status, version, and indexed chunk count |
//! | `POST`   | `/documents` | Upload `{filename, text, file_path?}` |
//! | `GET`    | `/documents` | List documents with chunk counts |
//! | `DELETE` | `/documents/{filename}` | Remove a document (204, or 404) |
//! | `POST`   | `/ask` | `{user_id, question}` → `{answer, cached, persisted}` |
//! | `GET`    | `/history/{user_id}` | One user's questions, newest first |
//! | `GET`    | `/history` | Every user's questions, newest first |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_material", "message": "no lecture material has been indexed" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `invalid_input` | 400 |
//! | `no_material`, `not_found` | 404 |
//! | `no_relevant_context` | 422 |
//! | `embedding_failed`, `completion_failed` | 502 |
//! | `dimension_mismatch`, `storage`, `configuration` | 500 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use lecture_rag_core::models::{DocumentSummary, QaRecord};
use lecture_rag_core::RagError;

use crate::answer::{Answer, AnswerService};
use crate::ingest::{self, IngestReport};
use crate::state::AppContext;

#[derive(Clone)]
struct AppState {
    ctx: AppContext,
    answers: Arc<AnswerService>,
}

/// Build the router. Exposed so tests can serve it on an ephemeral port.
pub fn router(ctx: AppContext) -> Router {
    let state = AppState {
        answers: Arc::new(AnswerService::new(&ctx)),
        ctx,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", post(handle_upload).get(handle_list_documents))
        .route("/documents/{filename}", delete(handle_delete_document))
        .route("/ask", post(handle_ask))
        .route("/history", get(handle_all_history))
        .route("/history/{user_id}", get(handle_user_history))
        .layer(cors)
        .with_state(state)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(ctx: AppContext) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let indexed = ctx.index.len().await;
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, indexed_chunks = indexed, "server listening");
    println!("Lecture RAG server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = if err.is_user_facing() {
            match &err {
                RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                RagError::NoRelevantContext => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::NOT_FOUND,
            }
        } else if err.is_retryable() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    indexed_chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        indexed_chunks: state.ctx.index.len().await,
    })
}

// ============ /documents ============

#[derive(Deserialize)]
struct UploadRequest {
    filename: String,
    text: String,
    #[serde(default)]
    file_path: Option<String>,
}

async fn handle_upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let file_path = req.file_path.unwrap_or_else(|| req.filename.clone());
    let report = ingest::ingest_document(&state.ctx, &req.filename, &file_path, &req.text).await?;
    Ok(Json(report))
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
    Ok(Json(state.ctx.store.list_documents().await?))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<StatusCode, AppError> {
    if ingest::delete_document(&state.ctx, &filename).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RagError::NotFound(format!("no document named '{}'", filename)).into())
    }
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    user_id: i64,
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    Ok(Json(state.answers.ask(req.user_id, &req.question).await?))
}

// ============ /history ============

async fn handle_user_history(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<QaRecord>>, AppError> {
    Ok(Json(state.ctx.store.list_answers(user_id).await?))
}

async fn handle_all_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<QaRecord>>, AppError> {
    Ok(Json(state.ctx.store.list_all_answers().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: RagError) -> StatusCode {
        AppError::from(err).status
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_of(RagError::InvalidInput("q".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(RagError::EmptyIndex), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(RagError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RagError::NoRelevantContext),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(RagError::EmbeddingService("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(RagError::CompletionService("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(RagError::Storage("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(RagError::Configuration("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
