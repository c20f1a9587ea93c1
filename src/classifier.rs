//! Response and error classification.
//!
//! Both entry points are total: whatever the backend (or the transport) hands
//! back, the caller gets something it can render.

use crate::errors::{ApiClientError, ClassifiedError, ErrorCode};
use crate::models::{ApiErrorBody, Decision, RiskBand, ScoreResult};
use serde_json::{Map, Value};

const PROBABILITY_KEYS: &[&str] = &[
    "default_probability",
    "probability",
    "defaultProbability",
    "probability_of_default",
];
const RISK_BAND_KEYS: &[&str] = &["risk_band", "riskBand", "risk"];
const DECISION_KEYS: &[&str] = &["model_decision", "decision", "modelDecision"];
const APPLICATION_ID_KEYS: &[&str] = &["application_id", "applicationId", "applicant_id", "id"];
const FACTOR_KEYS: &[&str] = &["top_factors", "topFactors", "factors"];
const FACTOR_NAME_KEYS: &[&str] = &["feature", "name", "factor"];

/// Longest raw response excerpt kept in a log message.
const MAX_RAW_EXCERPT: usize = 500;

// ============ Success ============

/// Maps a scoring response onto [`ScoreResult`].
///
/// Field names differ between backend versions. Missing values fall back
/// to the most conservative reading: probability `1.0`, decision `REJECT`,
/// risk band derived from the probability, no factors.
pub fn classify_success(raw: &Value) -> ScoreResult {
    let empty = Map::new();
    let fields = unwrap_envelope(raw).unwrap_or(&empty);

    let probability = first_of(fields, PROBABILITY_KEYS)
        .and_then(number_of)
        .map(probability_fraction)
        .unwrap_or(1.0);

    let risk_band = first_of(fields, RISK_BAND_KEYS)
        .and_then(Value::as_str)
        .and_then(parse_risk_band)
        .unwrap_or_else(|| RiskBand::from_probability(probability));

    let decision = first_of(fields, DECISION_KEYS)
        .and_then(Value::as_str)
        .and_then(parse_decision)
        .unwrap_or(Decision::Reject);

    let application_id = first_of(fields, APPLICATION_ID_KEYS)
        .and_then(text_of)
        .unwrap_or_default();

    let top_factors = first_of(fields, FACTOR_KEYS)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(factor_name).collect())
        .unwrap_or_default();

    ScoreResult {
        decision,
        probability,
        risk_band,
        application_id,
        top_factors,
    }
}

/// Responses are either flat or wrapped in `{"data": {...}}` / `{"result": {...}}`.
fn unwrap_envelope(raw: &Value) -> Option<&Map<String, Value>> {
    let fields = raw.as_object()?;
    if first_of(fields, PROBABILITY_KEYS).is_some() || first_of(fields, DECISION_KEYS).is_some() {
        return Some(fields);
    }
    ["data", "result"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_object))
        .or(Some(fields))
}

pub(crate) fn first_of<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

pub(crate) fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Some backends report percentages (`48`) instead of fractions (`0.48`).
fn probability_fraction(p: f64) -> f64 {
    let p = if p > 1.0 && p <= 100.0 { p / 100.0 } else { p };
    p.clamp(0.0, 1.0)
}

fn parse_risk_band(label: &str) -> Option<RiskBand> {
    match label.trim().to_ascii_uppercase().as_str() {
        "LOW" => Some(RiskBand::Low),
        "MEDIUM" | "MED" | "MODERATE" => Some(RiskBand::Medium),
        "HIGH" => Some(RiskBand::High),
        _ => None,
    }
}

fn parse_decision(label: &str) -> Option<Decision> {
    match label.trim().to_ascii_uppercase().as_str() {
        "APPROVE" | "APPROVED" | "ACCEPT" | "ACCEPTED" => Some(Decision::Approve),
        "REJECT" | "REJECTED" | "DECLINE" | "DECLINED" => Some(Decision::Reject),
        _ => None,
    }
}

fn factor_name(item: &Value) -> Option<String> {
    match item {
        Value::Object(fields) => first_of(fields, FACTOR_NAME_KEYS).and_then(text_of),
        other => text_of(other),
    }
}

// ============ Errors ============

/// Anything a failed call can leave the caller holding.
#[derive(Debug, Clone)]
pub enum ErrorSource {
    /// A transport or HTTP failure.
    Client(ApiClientError),
    /// An error that was already classified upstream; passed through untouched.
    Classified(ClassifiedError),
    /// A bare message with no structure.
    Message(String),
    /// Nothing at all.
    Unknown,
}

impl ErrorSource {
    /// Inspects an arbitrary error, recovering structure where the concrete type allows.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(client) = err.downcast_ref::<ApiClientError>() {
            ErrorSource::Client(client.clone())
        } else if let Some(classified) = err.downcast_ref::<ClassifiedError>() {
            ErrorSource::Classified(classified.clone())
        } else if let Some(transport) = err.downcast_ref::<reqwest::Error>() {
            ErrorSource::Client(ApiClientError::from(transport))
        } else {
            ErrorSource::Message(err.to_string())
        }
    }
}

impl From<ApiClientError> for ErrorSource {
    fn from(err: ApiClientError) -> Self {
        ErrorSource::Client(err)
    }
}

impl From<ClassifiedError> for ErrorSource {
    fn from(err: ClassifiedError) -> Self {
        ErrorSource::Classified(err)
    }
}

impl From<reqwest::Error> for ErrorSource {
    fn from(err: reqwest::Error) -> Self {
        ErrorSource::Client(ApiClientError::from(err))
    }
}

impl From<anyhow::Error> for ErrorSource {
    fn from(err: anyhow::Error) -> Self {
        ErrorSource::from_error(&*err)
    }
}

impl From<String> for ErrorSource {
    fn from(message: String) -> Self {
        ErrorSource::Message(message)
    }
}

impl From<&str> for ErrorSource {
    fn from(message: &str) -> Self {
        ErrorSource::Message(message.to_string())
    }
}

impl From<()> for ErrorSource {
    fn from(_: ()) -> Self {
        ErrorSource::Unknown
    }
}

impl<T: Into<ErrorSource>> From<Option<T>> for ErrorSource {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ErrorSource::Unknown)
    }
}

/// Which kind of call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorContext {
    #[default]
    Request,
    /// Batch file upload; payload, connection and server failures become `UPLOAD_ERROR`.
    Upload,
}

/// Classifies a failed scoring call.
pub fn classify_error(input: impl Into<ErrorSource>) -> ClassifiedError {
    classify_error_in(input, ErrorContext::Request)
}

/// Classifies a failed call made in `context`.
pub fn classify_error_in(input: impl Into<ErrorSource>, context: ErrorContext) -> ClassifiedError {
    let classified = match input.into() {
        ErrorSource::Classified(err) => return err,
        ErrorSource::Client(err) => classify_client_error(&err),
        ErrorSource::Message(message) => ClassifiedError::new(ErrorCode::UnknownError, message),
        ErrorSource::Unknown => ClassifiedError::from_code(ErrorCode::UnknownError),
    };

    match context {
        ErrorContext::Upload if is_upload_failure(classified.code) => {
            ClassifiedError::new(ErrorCode::UploadError, classified.message)
        }
        _ => classified,
    }
}

fn is_upload_failure(code: ErrorCode) -> bool {
    !matches!(
        code,
        ErrorCode::Unauthorized | ErrorCode::Forbidden | ErrorCode::Timeout
    )
}

fn classify_client_error(err: &ApiClientError) -> ClassifiedError {
    match err {
        ApiClientError::Timeout(msg) => ClassifiedError::new(ErrorCode::Timeout, msg.clone()),
        ApiClientError::Network(msg) => ClassifiedError::new(ErrorCode::NetworkError, msg.clone()),
        ApiClientError::Decode(msg) => ClassifiedError::new(ErrorCode::UnknownError, msg.clone()),
        ApiClientError::InvalidUpload(msg) => {
            ClassifiedError::new(ErrorCode::UploadError, msg.clone())
        }
        ApiClientError::Http { status, body, raw } => {
            let code = code_for_status(*status)
                .or_else(|| {
                    body.as_ref()
                        .and_then(|b| b.code.as_deref())
                        .and_then(|c| c.parse::<ErrorCode>().ok())
                })
                .unwrap_or(ErrorCode::UnknownError);
            ClassifiedError::new(code, http_message(*status, body.as_ref(), raw))
        }
    }
}

/// Status → code table. `None` for statuses the table does not cover.
pub fn code_for_status(status: u16) -> Option<ErrorCode> {
    match status {
        401 => Some(ErrorCode::Unauthorized),
        403 => Some(ErrorCode::Forbidden),
        404 => Some(ErrorCode::NotFound),
        400 | 422 => Some(ErrorCode::ValidationError),
        s if s >= 500 => Some(ErrorCode::ServerError),
        _ => None,
    }
}

fn http_message(status: u16, body: Option<&ApiErrorBody>, raw: &str) -> String {
    if let Some(message) = body
        .and_then(|b| b.message.as_ref())
        .map(|m| m.joined())
        .filter(|m| !m.is_empty())
    {
        return message;
    }
    let raw = raw.trim();
    if raw.is_empty() || body.is_some() {
        return format!("HTTP {}", status);
    }
    format!("HTTP {}: {}", status, excerpt(raw))
}

/// First `MAX_RAW_EXCERPT` characters of a raw response body.
pub(crate) fn excerpt(raw: &str) -> String {
    raw.chars().take(MAX_RAW_EXCERPT).collect()
}
