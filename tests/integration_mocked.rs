/// Integration tests with a mocked scoring API
/// Exercises the full normalize → send → classify path without a real backend
use loan_score_client::classify_error;
use loan_score_client::config::Config;
use loan_score_client::errors::{ErrorCode, Severity};
use loan_score_client::models::{
    Decision, FieldValue, JobStatus, LoanApplicationForm, RiskBand,
};
use loan_score_client::scoring_client::{ScoringClient, TokenProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(base_url: String) -> Config {
    Config {
        port: 8080,
        score_api_base_url: base_url,
        score_api_token: Some("test_token".to_string()),
        json_timeout_secs: 30,
        upload_timeout_secs: 60,
    }
}

fn sample_form() -> LoanApplicationForm {
    LoanApplicationForm {
        applicant_id: Some("APP-1234".into()),
        age: Some(30i64.into()),
        income: Some(2000i64.into()),
        monthly_expenses: Some(300i64.into()),
        existing_debt: Some(100i64.into()),
        requested_amount: Some(50000i64.into()),
        term_months: Some(36i64.into()),
        employment_status: Some("EMPLOYED".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_score_loan_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .and(header("Authorization", "Bearer test_token"))
        .and(body_partial_json(serde_json::json!({
            "applicant_id": "APP-1234",
            "dtiratio": 0.2,
            "employmenttype": "salaried",
            "loanterm": 36
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "application_id": "APP-1234",
            "default_probability": 0.48,
            "risk_band": "MEDIUM",
            "model_decision": "APPROVE",
            "top_factors": ["dti", "income"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = client.score_loan(&sample_form()).await.unwrap();

    assert_eq!(result.decision, Decision::Approve);
    assert_eq!(result.risk_band, RiskBand::Medium);
    assert_eq!(result.probability, 0.48);
    assert_eq!(result.application_id, "APP-1234");
    assert_eq!(result.top_factors, vec!["dti", "income"]);
}

#[tokio::test]
async fn test_missing_application_id_uses_payload_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "probability": 0.1,
            "decision": "APPROVE"
        })))
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = client.score_loan(&sample_form()).await.unwrap();

    assert_eq!(result.application_id, "APP-1234");
    assert_eq!(result.risk_band, RiskBand::Low);
}

#[tokio::test]
async fn test_unauthorized_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "code": "UNAUTHORIZED",
            "message": "expired"
        })))
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client.score_loan(&sample_form()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::Unauthorized);
    assert_eq!(err.severity, Severity::Warning);
    assert_eq!(err.message, "expired");
    assert_eq!(
        err.user_message,
        "Your session has expired. Please log in again."
    );
}

#[tokio::test]
async fn test_validation_errors_are_joined() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "code": "VALIDATION_ERROR",
            "message": ["age must be at least 18", "loanterm must be positive"]
        })))
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client.score_loan(&sample_form()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ValidationError);
    assert_eq!(
        err.message,
        "age must be at least 18; loanterm must be positive"
    );
}

#[tokio::test]
async fn test_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client.score_loan(&sample_form()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ServerError);
    assert_eq!(err.severity, Severity::Error);
    assert_eq!(err.message, "HTTP 500: Internal Server Error");
}

#[tokio::test]
async fn test_invalid_json_success_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client.score_loan(&sample_form()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::UnknownError);
}

#[tokio::test]
async fn test_timeout_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"probability": 0.1}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = Config {
        json_timeout_secs: 1,
        ..create_test_config(mock_server.uri())
    };
    let client = ScoringClient::new(&config).unwrap();
    let err = client.score_loan(&sample_form()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::Timeout);
    assert_eq!(err.severity, Severity::Warning);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Nothing listens on port 1
    let client = ScoringClient::new(&create_test_config("http://127.0.0.1:1".to_string())).unwrap();
    let err = client.score_loan(&sample_form()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::NetworkError);
    assert!(!err.user_message.is_empty());
}

#[tokio::test]
async fn test_no_token_sends_no_authorization_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "probability": 0.2,
            "decision": "APPROVE"
        })))
        .mount(&mock_server)
        .await;

    let config = Config {
        score_api_token: None,
        ..create_test_config(mock_server.uri())
    };
    let client = ScoringClient::new(&config).unwrap();
    client.score_loan(&sample_form()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

/// Hands out a new token on every call.
struct CountingTokens(AtomicUsize);

impl TokenProvider for CountingTokens {
    fn bearer_token(&self) -> Option<String> {
        Some(format!("token-{}", self.0.fetch_add(1, Ordering::SeqCst)))
    }
}

#[tokio::test]
async fn test_token_provider_is_asked_per_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .and(header("Authorization", "Bearer token-0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/score"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tokens = Arc::new(CountingTokens(AtomicUsize::new(0)));
    let client =
        ScoringClient::with_token_provider(&create_test_config(mock_server.uri()), tokens).unwrap();

    client.score_loan(&sample_form()).await.unwrap();
    client.score_loan(&sample_form()).await.unwrap();
}

#[tokio::test]
async fn test_batch_upload_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/batch"))
        .and(header("Authorization", "Bearer test_token"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "jobId": "JOB-77",
            "status": "Queued"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let csv = b"applicantId,income,employmentStatus\nAPP-1,4000,EMPLOYED\nAPP-2,3000,Salaried\n";
    let submission = client
        .upload_batch("map_8823_cred_bureau_v2", "loans.csv", csv.to_vec())
        .await
        .unwrap();

    assert_eq!(submission.job_id, "JOB-77");
    assert_eq!(submission.status, JobStatus::Queued);
    assert_eq!(submission.records_count, 2);

    let requests = mock_server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("map_8823_cred_bureau_v2"));
    assert!(body.contains("filename=\"loans.csv\""));
}

#[tokio::test]
async fn test_batch_upload_server_failure_is_upload_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/batch"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client
        .upload_batch("map_1", "loans.csv", b"income\n4000\n".to_vec())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::UploadError);
    assert_eq!(err.severity, Severity::Error);
}

#[tokio::test]
async fn test_invalid_batch_is_rejected_before_sending() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();

    let err = client
        .upload_batch("  ", "loans.csv", b"income\n4000\n".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UploadError);

    let err = client
        .upload_batch("map_1", "loans.csv", b"income,age\n4000\n".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UploadError);
}

#[tokio::test]
async fn test_batch_upload_unauthorized_keeps_code() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/batch"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = client
        .upload_batch("map_1", "loans.csv", b"income\n4000\n".to_vec())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn test_job_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/jobs/JOB-77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "Completed",
            "records_count": 120
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/JOB-404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "code": "NOT_FOUND",
            "message": "no such job"
        })))
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();

    let job = client.job_status("JOB-77").await.unwrap();
    assert_eq!(job.job_id, "JOB-77");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_count, 120);

    let err = client.job_status("JOB-404").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_concurrent_score_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "default_probability": 0.7,
            "model_decision": "REJECT"
        })))
        .expect(10) // Expect 10 concurrent requests
        .mount(&mock_server)
        .await;

    let client = ScoringClient::new(&create_test_config(mock_server.uri())).unwrap();

    // Fire 10 concurrent requests
    let mut handles = vec![];
    for i in 0..10 {
        let client = client.clone();
        let handle = tokio::spawn(async move {
            let form = LoanApplicationForm {
                applicant_id: Some(FieldValue::Text(format!("APP-{}", i))),
                ..sample_form()
            };
            client.score_loan(&form).await
        });
        handles.push(handle);
    }

    // Wait for all to complete
    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.application_id, format!("APP-{}", i));
        assert_eq!(result.risk_band, RiskBand::High);
    }
}

/// A real `reqwest` decode failure from a non-JSON body.
async fn decode_error(url: &str) -> reqwest::Error {
    reqwest::get(url)
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap_err()
}

#[tokio::test]
async fn test_decode_errors_classify_the_same_when_boxed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/jobs/JOB-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/api/jobs/JOB-1", mock_server.uri());
    let direct = classify_error(decode_error(&url).await);
    let boxed = classify_error(anyhow::Error::from(decode_error(&url).await));

    assert_eq!(direct.code, ErrorCode::UnknownError);
    assert_eq!(boxed.code, ErrorCode::UnknownError);
    assert_eq!(direct.severity, boxed.severity);
}
