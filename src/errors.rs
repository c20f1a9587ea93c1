use crate::models::{ApiErrorBody, ErrorMessage};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of error codes surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationError,
    ServerError,
    Timeout,
    UploadError,
    UnknownError,
}

/// How prominently the UI should present an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::NetworkError,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::NotFound,
        ErrorCode::ValidationError,
        ErrorCode::ServerError,
        ErrorCode::Timeout,
        ErrorCode::UploadError,
        ErrorCode::UnknownError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::UploadError => "UPLOAD_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Fixed severity of the code.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::Unauthorized | ErrorCode::ValidationError | ErrorCode::Timeout => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// Fixed message that is safe to show to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "Unable to connect to the server. Please check your internet connection and try again.",
            ErrorCode::Unauthorized => "Your session has expired. Please log in again.",
            ErrorCode::Forbidden => "You do not have permission to perform this action.",
            ErrorCode::NotFound => "The requested resource could not be found.",
            ErrorCode::ValidationError => "Please check your input and try again.",
            ErrorCode::ServerError => "An error occurred on the server. Please try again later.",
            ErrorCode::Timeout => "The request took too long. Please try again.",
            ErrorCode::UploadError => "The file could not be uploaded. Please check the file and try again.",
            ErrorCode::UnknownError => "Something went wrong. Please try again or contact support if the problem persists.",
        }
    }

    /// Log message used when nothing more specific is known.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "Network request failed",
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access denied",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::ValidationError => "Invalid input",
            ErrorCode::ServerError => "Server error",
            ErrorCode::Timeout => "Request timeout",
            ErrorCode::UploadError => "Upload failed",
            ErrorCode::UnknownError => "An unexpected error occurred",
        }
    }

    /// Status the HTTP shell answers with for this code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::UploadError => StatusCode::BAD_REQUEST,
            ErrorCode::ServerError | ErrorCode::NetworkError => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = ();

    /// Parses a backend code, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ErrorCode::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(wanted))
            .ok_or(())
    }
}

/// Outcome of error classification: what to log and what to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub code: ErrorCode,
    /// Raw detail for logs.
    pub message: String,
    /// Safe for display.
    pub user_message: String,
    pub severity: Severity,
}

impl ClassifiedError {
    /// Builds an error with the code's fixed user message and severity.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            code.default_message().to_string()
        } else {
            message
        };
        Self {
            code,
            message,
            user_message: code.user_message().to_string(),
            severity: code.severity(),
        }
    }

    /// Error with only the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ClassifiedError {}

impl IntoResponse for ClassifiedError {
    /// Renders the error as JSON for the UI.
    ///
    /// The raw message goes to the log, never into the response body.
    fn into_response(self) -> Response {
        match self.severity {
            Severity::Error => tracing::error!("{}", self),
            Severity::Warning => tracing::warn!("{}", self),
            Severity::Info => tracing::info!("{}", self),
        }

        let status = self.code.http_status();
        let body = Json(serde_json::json!({
            "code": self.code,
            "userMessage": self.user_message,
            "severity": self.severity,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ClassifiedError {
    /// Malformed request bodies: bad syntax, wrong field shapes, missing content type.
    fn from(rejection: JsonRejection) -> Self {
        ClassifiedError::new(ErrorCode::ValidationError, rejection.body_text())
    }
}

/// Failures produced by the scoring API transport.
#[derive(Debug, Clone)]
pub enum ApiClientError {
    /// The request exceeded its deadline or was aborted.
    Timeout(String),
    /// DNS, connection or other transport-level failure.
    Network(String),
    /// The API answered with a non-2xx status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Parsed `{code, message}` body, when the API sent one.
        body: Option<ApiErrorBody>,
        /// Raw response text.
        raw: String,
    },
    /// A 2xx response whose body could not be read as JSON.
    Decode(String),
    /// A batch file rejected before it was sent.
    InvalidUpload(String),
}

impl fmt::Display for ApiClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiClientError::Timeout(msg) => write!(f, "Request timed out: {}", msg),
            ApiClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiClientError::Http { status, raw, .. } => write!(f, "HTTP {}: {}", status, raw),
            ApiClientError::Decode(msg) => write!(f, "Failed to parse response: {}", msg),
            ApiClientError::InvalidUpload(msg) => write!(f, "Invalid upload: {}", msg),
        }
    }
}

impl std::error::Error for ApiClientError {}

impl From<reqwest::Error> for ApiClientError {
    fn from(err: reqwest::Error) -> Self {
        ApiClientError::from(&err)
    }
}

impl From<&reqwest::Error> for ApiClientError {
    /// Splits transport failures into timeouts, undecodable bodies and everything else.
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiClientError::Decode(err.to_string())
        } else {
            ApiClientError::Network(err.to_string())
        }
    }
}

impl ApiClientError {
    /// Builds an `Http` error from a status and the response text.
    ///
    /// Accepts both `{code, message}` objects and bare arrays of validation messages.
    pub fn from_response(status: u16, raw: String) -> Self {
        let body = serde_json::from_str::<ApiErrorBody>(&raw).ok().or_else(|| {
            serde_json::from_str::<Vec<String>>(&raw)
                .ok()
                .map(|messages| ApiErrorBody {
                    code: None,
                    message: Some(ErrorMessage::List(messages)),
                })
        });
        ApiClientError::Http { status, body, raw }
    }
}
