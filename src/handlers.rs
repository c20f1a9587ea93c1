use crate::batch::{template_csv, MAX_BATCH_BYTES};
use crate::config::Config;
use crate::errors::{ClassifiedError, ErrorCode};
use crate::models::{BatchSubmission, CanonicalScorePayload, LoanApplicationForm, ScoreResult};
use crate::normalizer::normalize;
use crate::scoring_client::ScoringClient;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the external scoring API.
    pub client: ScoringClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ClassifiedError> {
        let client = ScoringClient::new(&config).map_err(crate::classifier::classify_error)?;
        Ok(Self { config, client })
    }
}

/// Builds the router serving the scoring core to UI clients.
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/normalize", post(normalize_form))
        .route("/api/v1/score", post(score))
        .route("/api/v1/batch/template", get(batch_template))
        .route("/api/v1/batch", post(upload_batch))
        .route("/api/v1/jobs/:job_id", get(job_status))
        .layer(
            ServiceBuilder::new()
                // Batch files may be up to 50MB
                .layer(DefaultBodyLimit::max(MAX_BATCH_BYTES))
                .layer(RequestBodyLimitLayer::new(MAX_BATCH_BYTES)),
        );

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "loan-score-client",
            "version": env!("CARGO_PKG_VERSION"),
            "scoring_api": state.config.score_api_base_url,
        })),
    )
}

/// POST /api/v1/normalize
///
/// Returns the payload that would be sent for this form, without calling the scoring API.
pub async fn normalize_form(
    payload: Result<Json<LoanApplicationForm>, JsonRejection>,
) -> Result<Json<CanonicalScorePayload>, ClassifiedError> {
    let Json(form) = payload?;
    Ok(Json(normalize(&form)))
}

/// POST /api/v1/score
pub async fn score(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoanApplicationForm>, JsonRejection>,
) -> Result<Json<ScoreResult>, ClassifiedError> {
    let Json(form) = payload?;
    let result = state.client.score_loan(&form).await?;
    Ok(Json(result))
}

/// GET /api/v1/batch/template
pub async fn batch_template() -> Result<impl IntoResponse, ClassifiedError> {
    let csv = template_csv()
        .map_err(|e| ClassifiedError::new(ErrorCode::UnknownError, e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"loan_batch_template.csv\"",
            ),
        ],
        csv,
    ))
}

/// Query parameters for batch uploads.
#[derive(Debug, Deserialize)]
pub struct BatchUploadParams {
    pub mapping_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// POST /api/v1/batch
///
/// The request body is the raw CSV file.
pub async fn upload_batch(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BatchUploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<BatchSubmission>), ClassifiedError> {
    let file_name = params
        .file_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "batch.csv".to_string());

    let submission = state
        .client
        .upload_batch(&params.mapping_id, &file_name, body.to_vec())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(submission)))
}

/// GET /api/v1/jobs/:job_id
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<BatchSubmission>, ClassifiedError> {
    let job = state.client.job_status(&job_id).await?;
    Ok(Json(job))
}
