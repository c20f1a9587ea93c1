use crate::batch::{parse_job, parse_submission, validate_batch};
use crate::classifier::{classify_error, classify_error_in, classify_success, excerpt, ErrorContext};
use crate::config::Config;
use crate::errors::{ApiClientError, ClassifiedError, ErrorCode};
use crate::models::{BatchSubmission, CanonicalScorePayload, LoanApplicationForm, ScoreResult};
use crate::normalizer::{RandomApplicationId, RequestNormalizer};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Supplies the bearer token for outgoing requests.
///
/// Token storage (session, keychain, env) belongs to the caller.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A token fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Client for the external loan scoring API.
#[derive(Clone)]
pub struct ScoringClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    normalizer: RequestNormalizer<RandomApplicationId>,
    json_timeout: Duration,
    upload_timeout: Duration,
}

impl ScoringClient {
    /// Creates a client using the token from `config`.
    pub fn new(config: &Config) -> Result<Self, ApiClientError> {
        let tokens = Arc::new(StaticToken::new(config.score_api_token.clone()));
        Self::with_token_provider(config, tokens)
    }

    /// Creates a client that asks `tokens` for credentials on every request.
    pub fn with_token_provider(
        config: &Config,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.json_timeout())
            .build()
            .map_err(|e| {
                ApiClientError::Network(format!("Failed to create scoring client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.score_api_base_url.trim_end_matches('/').to_string(),
            tokens,
            normalizer: RequestNormalizer::default(),
            json_timeout: config.json_timeout(),
            upload_timeout: config.upload_timeout(),
        })
    }

    /// Joins `endpoint` onto the base URL.
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// POSTs `body` as JSON and returns the JSON response.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Value, ApiClientError> {
        let url = self.url(endpoint);
        tracing::debug!("POST {}", url);

        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .timeout(self.json_timeout);
        let response = self.authorize(request).send().await?;

        read_json(response).await
    }

    /// GETs `endpoint` and returns the JSON response.
    pub async fn get_json(&self, endpoint: &str) -> Result<Value, ApiClientError> {
        let url = self.url(endpoint);
        tracing::debug!("GET {}", url);

        let request = self.client.get(&url).timeout(self.json_timeout);
        let response = self.authorize(request).send().await?;

        read_json(response).await
    }

    /// Normalizes and scores a form.
    pub async fn score_loan(
        &self,
        form: &LoanApplicationForm,
    ) -> Result<ScoreResult, ClassifiedError> {
        let payload = self.normalizer.normalize(form);
        self.score_payload(&payload).await
    }

    /// Scores an already normalized payload.
    ///
    /// When the response carries no application id, the payload's id is used.
    pub async fn score_payload(
        &self,
        payload: &CanonicalScorePayload,
    ) -> Result<ScoreResult, ClassifiedError> {
        tracing::info!("Scoring application {}", payload.applicant_id);

        let raw = self.send_json("/api/score", payload).await.map_err(|e| {
            let classified = classify_error(e);
            tracing::warn!(
                "Scoring failed for {}: {}",
                payload.applicant_id,
                classified
            );
            classified
        })?;

        let mut result = classify_success(&raw);
        if result.application_id.is_empty() {
            result.application_id = payload.applicant_id.clone();
        }

        tracing::info!(
            "✓ Application {} scored: {} ({} risk, p={:.3})",
            result.application_id,
            result.decision,
            result.risk_band,
            result.probability
        );
        Ok(result)
    }

    /// Uploads a batch CSV for asynchronous scoring.
    pub async fn upload_batch(
        &self,
        mapping_id: &str,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<BatchSubmission, ClassifiedError> {
        let upload_error = |e: ApiClientError| {
            let classified = classify_error_in(e, ErrorContext::Upload);
            tracing::warn!("Batch upload '{}' failed: {}", file_name, classified);
            classified
        };

        let rows = validate_batch(mapping_id, &contents).map_err(&upload_error)?.len() as u64;
        tracing::info!(
            "Uploading batch '{}' ({} rows, mapping {})",
            file_name,
            rows,
            mapping_id
        );

        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| upload_error(ApiClientError::InvalidUpload(e.to_string())))?;
        let form = Form::new()
            .text("mapping_id", mapping_id.trim().to_string())
            .part("file", part);

        let request = self
            .client
            .post(self.url("/api/batch"))
            .multipart(form)
            .timeout(self.upload_timeout);
        let raw = match self.authorize(request).send().await {
            Ok(response) => read_json(response).await,
            Err(e) => Err(ApiClientError::from(e)),
        }
        .map_err(&upload_error)?;

        let submission = parse_submission(&raw, rows).ok_or_else(|| {
            upload_error(ApiClientError::Decode(
                "Batch response missing job id".to_string(),
            ))
        })?;
        tracing::info!("✓ Batch accepted as job {}", submission.job_id);
        Ok(submission)
    }

    /// Fetches the state of a batch job.
    pub async fn job_status(&self, job_id: &str) -> Result<BatchSubmission, ClassifiedError> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(ClassifiedError::new(
                ErrorCode::ValidationError,
                "Job id is required",
            ));
        }
        if !is_valid_job_id(job_id) {
            tracing::warn!("Rejected malformed job id '{}'", job_id.escape_debug());
            return Err(ClassifiedError::new(
                ErrorCode::ValidationError,
                "Job id may only contain letters, digits, '-' and '_'",
            ));
        }

        let raw = self
            .get_json(&format!("/api/jobs/{}", job_id))
            .await
            .map_err(classify_error)?;

        Ok(parse_job(&raw, job_id))
    }
}

/// Job ids are interpolated into the request path, so only `[A-Za-z0-9_-]` is allowed.
fn is_valid_job_id(job_id: &str) -> bool {
    job_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Turns a response into JSON, or into an `Http` error for non-2xx statuses.
async fn read_json(response: reqwest::Response) -> Result<Value, ApiClientError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::warn!("Scoring API returned {}: {}", status, excerpt(&error_text));
        return Err(ApiClientError::from_response(status.as_u16(), error_text));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiClientError::Decode(e.to_string()))
}
