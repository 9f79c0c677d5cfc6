use crate::config::SearchConfig;
use crate::engine::SearchEngine;
use crate::enrich::{enrich_page, EnrichedResult, MetadataProvider};
use crate::error::SearchError;
use crate::index::{BuildReport, IndexStats};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub search: SearchConfig,
    pub request_timeout: Duration,
}

// ========== Request/Response Types ==========

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchPayload {
    pub data: Vec<EnrichedResult>,
    pub total_count: usize,
    pub query: String,
    pub duration_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct ReindexPayload {
    pub indexed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub generation: u64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    fn error(message: String) -> Self {
        Self {
            success: false,
            message: Some(message),
            data: None,
        }
    }
}

// ========== Error Handling ==========

enum AppError {
    /// Index could not be loaded; distinct from an empty result
    Search(SearchError),
    Timeout(Duration),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Search(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            AppError::Timeout(after) => (
                StatusCode::REQUEST_TIMEOUT,
                format!("operation timed out after {}s", after.as_secs_f64()),
            ),
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)),
        };
        tracing::error!(status = status.as_u16(), "API error: {}", message);

        (status, Json(ApiResponse::error(message))).into_response()
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        Self::Search(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.into())
    }
}

/// Run blocking engine work off the async executor, bounded by the request timeout
async fn run_blocking<T, F>(timeout: Duration, work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, SearchError> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(timeout, handle).await {
        Ok(joined) => Ok(joined??),
        Err(_) => Err(AppError::Timeout(timeout)),
    }
}

// ========== Handlers ==========

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success("OK"))
}

async fn search_get(
    State(state): State<AppState>,
    Query(req): Query<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    search_products(state, req).await
}

async fn search_post(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    search_products(state, req).await
}

async fn search_products(
    state: AppState,
    req: SearchRequest,
) -> Result<Json<ApiResponse<SearchPayload>>, AppError> {
    let limit = state.search.clamp_limit(req.limit);
    let offset = req.offset.unwrap_or(0);

    let engine = state.engine.clone();
    let metadata = state.metadata.clone();
    let query = req.query;

    let (response, data) = run_blocking(state.request_timeout, move || {
        let mut response = engine.search(&query, limit, offset)?;
        let page = std::mem::take(&mut response.page);
        let data = enrich_page(page, metadata.as_ref());
        Ok((response, data))
    })
    .await?;

    tracing::info!(
        query = %response.query,
        total = response.total_count,
        returned = data.len(),
        offset,
        limit,
        duration_ms = response.duration_ms,
        "Search completed"
    );

    let message = format!("Found {} products", response.total_count);
    let payload = SearchPayload {
        data,
        total_count: response.total_count,
        query: response.query,
        duration_ms: response.duration_ms,
    };

    Ok(Json(ApiResponse::success_with_message(payload, message)))
}

async fn reindex(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let engine = state.engine.clone();
    let report: BuildReport = run_blocking(state.request_timeout, move || engine.rebuild()).await?;

    let payload = ReindexPayload {
        indexed: report.indexed,
        skipped: report.skipped,
        duplicates: report.duplicates,
        generation: state.engine.stats().generation,
    };

    Ok(Json(ApiResponse::success(payload)))
}

async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<IndexStats>> {
    Json(ApiResponse::success(state.engine.stats()))
}

// ========== Router ==========

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search_get).post(search_post))
        .route("/reindex", post(reindex))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
