use serde::{Deserialize, Serialize};
use std::fmt;

// ============ UI Form Models ============

/// A loosely typed form value as the UI produces it while the user is typing.
///
/// Numeric inputs arrive as numbers, numeric strings, empty strings or
/// checkbox booleans; the normalizer coerces all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A JSON number.
    Number(f64),
    /// A checkbox or toggle.
    Flag(bool),
    /// Free text, including numbers typed into text inputs.
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Loan application as submitted by the UI.
///
/// Field names follow the current UI model (camelCase). Every name used by
/// earlier UI versions is accepted through `alias`, so old saved drafts and
/// batch templates keep working.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoanApplicationForm {
    /// Applicant identifier; synthesized when blank.
    #[serde(alias = "applicant_id", alias = "application_id", alias = "applicationId")]
    pub applicant_id: Option<FieldValue>,
    /// Age in years.
    pub age: Option<FieldValue>,
    /// Monthly income.
    pub income: Option<FieldValue>,
    /// Monthly recurring expenses.
    #[serde(alias = "monthly_expenses")]
    pub monthly_expenses: Option<FieldValue>,
    /// Existing monthly debt obligations.
    #[serde(alias = "existing_debt")]
    pub existing_debt: Option<FieldValue>,
    /// Requested principal.
    #[serde(
        alias = "requested_amount",
        alias = "loanAmount",
        alias = "loan_amount",
        alias = "loanamount"
    )]
    pub requested_amount: Option<FieldValue>,
    /// Requested term in months.
    #[serde(
        alias = "requested_term_months",
        alias = "term_months",
        alias = "loanTerm",
        alias = "loan_term",
        alias = "loanterm"
    )]
    pub term_months: Option<FieldValue>,
    /// Annual interest rate, either as a fraction (0.075) or a percentage (7.5).
    #[serde(alias = "interest_rate", alias = "interestrate")]
    pub interest_rate: Option<FieldValue>,
    /// Employment label; wording differs between UI versions.
    #[serde(
        alias = "employment_status",
        alias = "employmentType",
        alias = "employment_type",
        alias = "employmenttype"
    )]
    pub employment_status: Option<FieldValue>,
    #[serde(alias = "marital_status", alias = "maritalstatus")]
    pub marital_status: Option<FieldValue>,
    #[serde(alias = "loan_purpose", alias = "loanpurpose")]
    pub loan_purpose: Option<FieldValue>,
    #[serde(alias = "has_dependents", alias = "hasdependents")]
    pub has_dependents: Option<FieldValue>,
    /// Legacy field, no longer part of the scoring contract.
    #[serde(alias = "credit_score", skip_serializing)]
    pub credit_score: Option<FieldValue>,
    /// Legacy field, no longer part of the scoring contract.
    #[serde(alias = "employment_duration_months", skip_serializing)]
    pub employment_duration_months: Option<FieldValue>,
}

// ============ Scoring API Wire Models ============

/// Employment categories accepted by the scoring API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    Salaried,
    SelfEmployed,
    Unemployed,
}

impl EmploymentType {
    /// Wire value of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::Salaried => "salaried",
            EmploymentType::SelfEmployed => "self_employed",
            EmploymentType::Unemployed => "unemployed",
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for `POST /api/score`.
///
/// Field names are fixed by the scoring service; every field is always
/// present and finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalScorePayload {
    pub applicant_id: String,
    pub age: u32,
    pub income: f64,
    pub loanamount: f64,
    /// Fraction in `[0, 1]`.
    pub interestrate: f64,
    pub loanterm: u32,
    /// Debt-to-income ratio rounded to 4 decimal places.
    pub dtiratio: f64,
    pub employmenttype: EmploymentType,
    pub maritalstatus: String,
    pub loanpurpose: String,
    /// `0` or `1`.
    pub hasdependents: u8,
}

/// Final decision returned by the scoring model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => f.write_str("APPROVE"),
            Decision::Reject => f.write_str("REJECT"),
        }
    }
}

/// Coarse risk bucket derived from the default probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    /// Bucket used when the backend omits the band.
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.3 {
            RiskBand::Low
        } else if probability < 0.6 {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBand::Low => f.write_str("LOW"),
            RiskBand::Medium => f.write_str("MEDIUM"),
            RiskBand::High => f.write_str("HIGH"),
        }
    }
}

/// Parsed scoring outcome, independent of the backend version that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub decision: Decision,
    /// Probability of default in `[0, 1]`.
    pub probability: f64,
    pub risk_band: RiskBand,
    pub application_id: String,
    /// Contributing factors, most important first.
    pub top_factors: Vec<String>,
}

/// Error message as sent by the scoring API: a sentence or a list of
/// validation messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    List(Vec<String>),
}

impl ErrorMessage {
    /// Human-readable form; validation lists are joined with `"; "`.
    pub fn joined(&self) -> String {
        match self {
            ErrorMessage::Text(text) => text.trim().to_string(),
            ErrorMessage::List(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Error body returned by the scoring API on 4xx/5xx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<ErrorMessage>,
}

// ============ Batch Models ============

/// Processing state of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Parses a backend status label; unknown labels are reported as still processing.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => JobStatus::Queued,
            "completed" | "complete" | "done" | "succeeded" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }
}

/// Acknowledgement for an uploaded batch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubmission {
    pub job_id: String,
    pub status: JobStatus,
    pub records_count: u64,
}
