use crate::document::{DocId, Document};
use crate::engine::{SearchEngine, SearchResult};
use crate::error::Error;
use crate::index::IndexStats;
use crate::storage::Storage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// ========== Request/Response Types ==========

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct Bm25TfRequest {
    #[serde(default)]
    pub k1: Option<f64>,
    #[serde(default)]
    pub b: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: DocId,
    pub title: String,
    pub description: String,
    pub score: f64,
}

impl From<SearchResult> for SearchHit {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.document.id,
            title: result.document.title,
            description: result.document.description,
            score: result.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse<T> {
    pub term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<DocId>,
    pub value: T,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: String) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

// ========== Error Handling ==========

struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) | Error::InvalidQuery { .. } | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::UnknownDocument(_) | Error::UnknownTerm(_) => StatusCode::NOT_FOUND,
            Error::CorruptOrMissingCache { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.0.to_string();
        if status.is_server_error() {
            tracing::error!("API error: {}", message);
        } else {
            tracing::debug!("Rejected request: {}", message);
        }

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

// ========== State ==========

pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub storage: Storage,
    pub default_limit: usize,
}

type SharedState = State<Arc<AppState>>;

// ========== Handlers ==========

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success("OK"))
}

async fn get_stats(State(state): SharedState) -> Json<ApiResponse<IndexStats>> {
    Json(ApiResponse::success(state.engine.stats()))
}

async fn search_documents(
    State(state): SharedState,
    Query(req): Query<SearchRequest>,
) -> Result<Json<ApiResponse<SearchResponse>>, AppError> {
    let limit = req.limit.unwrap_or(state.default_limit);
    let results = state.engine.search(&req.q, limit)?;

    Ok(Json(ApiResponse::success(SearchResponse {
        query: req.q,
        results: results.into_iter().map(SearchHit::from).collect(),
    })))
}

async fn get_document(
    State(state): SharedState,
    Path(id): Path<DocId>,
) -> Result<Json<ApiResponse<Document>>, AppError> {
    let doc = state.engine.get_document(id).ok_or(Error::UnknownDocument(id))?;
    Ok(Json(ApiResponse::success(doc)))
}

async fn term_documents(
    State(state): SharedState,
    Path(term): Path<String>,
) -> Result<Json<ApiResponse<ScoreResponse<Vec<DocId>>>>, AppError> {
    let ids = state.engine.get_documents(&term)?;
    Ok(Json(ApiResponse::success(ScoreResponse {
        term,
        doc_id: None,
        value: ids,
    })))
}

async fn idf(
    State(state): SharedState,
    Path(term): Path<String>,
) -> Result<Json<ApiResponse<ScoreResponse<f64>>>, AppError> {
    let value = state.engine.idf(&term)?;
    Ok(Json(ApiResponse::success(ScoreResponse { term, doc_id: None, value })))
}

async fn bm25_idf(
    State(state): SharedState,
    Path(term): Path<String>,
) -> Result<Json<ApiResponse<ScoreResponse<f64>>>, AppError> {
    let value = state.engine.bm25_idf(&term)?;
    Ok(Json(ApiResponse::success(ScoreResponse { term, doc_id: None, value })))
}

async fn tf(
    State(state): SharedState,
    Path((doc_id, term)): Path<(DocId, String)>,
) -> Result<Json<ApiResponse<ScoreResponse<u32>>>, AppError> {
    let value = state.engine.tf(doc_id, &term)?;
    Ok(Json(ApiResponse::success(ScoreResponse {
        term,
        doc_id: Some(doc_id),
        value,
    })))
}

async fn tf_idf(
    State(state): SharedState,
    Path((doc_id, term)): Path<(DocId, String)>,
) -> Result<Json<ApiResponse<ScoreResponse<f64>>>, AppError> {
    let value = state.engine.tf_idf(doc_id, &term)?;
    Ok(Json(ApiResponse::success(ScoreResponse {
        term,
        doc_id: Some(doc_id),
        value,
    })))
}

async fn bm25_tf(
    State(state): SharedState,
    Path((doc_id, term)): Path<(DocId, String)>,
    Query(req): Query<Bm25TfRequest>,
) -> Result<Json<ApiResponse<ScoreResponse<f64>>>, AppError> {
    let value = state.engine.bm25_tf(doc_id, &term, req.k1, req.b)?;
    Ok(Json(ApiResponse::success(ScoreResponse {
        term,
        doc_id: Some(doc_id),
        value,
    })))
}

async fn bm25(
    State(state): SharedState,
    Path((doc_id, term)): Path<(DocId, String)>,
) -> Result<Json<ApiResponse<ScoreResponse<f64>>>, AppError> {
    let value = state.engine.bm25(doc_id, &term)?;
    Ok(Json(ApiResponse::success(ScoreResponse {
        term,
        doc_id: Some(doc_id),
        value,
    })))
}

async fn reload_index(State(state): SharedState) -> Result<Json<ApiResponse<IndexStats>>, AppError> {
    let stats = state.engine.load(&state.storage)?;
    tracing::info!("Reloaded index with {} documents", stats.total_documents);
    Ok(Json(ApiResponse::success(stats)))
}

// ========== Router ==========

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/search", get(search_documents))
        .route("/documents/:id", get(get_document))
        .route("/documents/:id/terms/:term/tf", get(tf))
        .route("/documents/:id/terms/:term/tfidf", get(tf_idf))
        .route("/documents/:id/terms/:term/bm25tf", get(bm25_tf))
        .route("/documents/:id/terms/:term/bm25", get(bm25))
        .route("/terms/:term/documents", get(term_documents))
        .route("/terms/:term/idf", get(idf))
        .route("/terms/:term/bm25idf", get(bm25_idf))
        .route("/index/reload", post(reload_index))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
