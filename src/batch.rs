//! Batch CSV files: template generation, local parsing and upload acknowledgements.

use crate::classifier::{first_of, text_of};
use crate::errors::ApiClientError;
use crate::models::{BatchSubmission, JobStatus, LoanApplicationForm};
use serde_json::{Map, Value};
use std::io::Read;

/// Largest batch file the scoring API accepts.
pub const MAX_BATCH_BYTES: usize = 50 * 1024 * 1024;

/// Column order of the downloadable template.
pub const TEMPLATE_HEADERS: &[&str] = &[
    "applicantId",
    "age",
    "income",
    "monthlyExpenses",
    "existingDebt",
    "requestedAmount",
    "termMonths",
    "interestRate",
    "employmentStatus",
    "maritalStatus",
    "loanPurpose",
    "hasDependents",
];

const TEMPLATE_EXAMPLE: &[&str] = &[
    "APP-1001", "30", "5000", "2000", "500", "50000", "36", "7.5", "EMPLOYED", "single",
    "home_improvement", "false",
];

/// Template CSV offered to users: header row plus one example row.
pub fn template_csv() -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TEMPLATE_HEADERS)?;
    writer.write_record(TEMPLATE_EXAMPLE)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads a batch CSV into forms.
///
/// Headers may use any field name the form accepts, current or legacy.
/// Empty cells are treated as missing; unknown columns are ignored.
pub fn parse_batch<R: Read>(reader: R) -> Result<Vec<LoanApplicationForm>, ApiClientError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| ApiClientError::InvalidUpload(format!("Unreadable header row: {}", e)))?
        .clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ApiClientError::InvalidUpload(
            "CSV file has no header row".to_string(),
        ));
    }

    let mut forms = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        // Row 1 is the header.
        let line = index + 2;
        let record = record
            .map_err(|e| ApiClientError::InvalidUpload(format!("Row {}: {}", line, e)))?;

        let fields: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, cell)| !header.is_empty() && !cell.is_empty())
            .map(|(header, cell)| (header.to_string(), Value::String(cell.to_string())))
            .collect();

        let form = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ApiClientError::InvalidUpload(format!("Row {}: {}", line, e)))?;
        forms.push(form);
    }

    Ok(forms)
}

/// Checks a batch before it leaves the process. Returns the parsed rows.
pub fn validate_batch(
    mapping_id: &str,
    contents: &[u8],
) -> Result<Vec<LoanApplicationForm>, ApiClientError> {
    if mapping_id.trim().is_empty() {
        return Err(ApiClientError::InvalidUpload(
            "Mapping ID is required".to_string(),
        ));
    }
    if contents.is_empty() {
        return Err(ApiClientError::InvalidUpload("CSV file is empty".to_string()));
    }
    if contents.len() > MAX_BATCH_BYTES {
        return Err(ApiClientError::InvalidUpload(format!(
            "CSV file is {} bytes, limit is {} bytes",
            contents.len(),
            MAX_BATCH_BYTES
        )));
    }

    let forms = parse_batch(contents)?;
    if forms.is_empty() {
        return Err(ApiClientError::InvalidUpload(
            "CSV file contains no applications".to_string(),
        ));
    }
    Ok(forms)
}

/// Reads a job acknowledgement. `None` when the response carries no job id.
pub fn parse_submission(raw: &Value, fallback_count: u64) -> Option<BatchSubmission> {
    read_submission(raw, None, fallback_count)
}

/// Reads a job status response for `job_id`; never fails.
pub fn parse_job(raw: &Value, job_id: &str) -> BatchSubmission {
    read_submission(raw, Some(job_id), 0).unwrap_or_else(|| BatchSubmission {
        job_id: job_id.to_string(),
        status: JobStatus::Processing,
        records_count: 0,
    })
}

fn read_submission(
    raw: &Value,
    known_id: Option<&str>,
    fallback_count: u64,
) -> Option<BatchSubmission> {
    let fields = raw.as_object()?;
    let fields = fields
        .get("data")
        .and_then(Value::as_object)
        .unwrap_or(fields);

    let job_id = first_of(fields, &["job_id", "jobId", "id"])
        .and_then(text_of)
        .or_else(|| known_id.map(str::to_string))?;
    let status = first_of(fields, &["status", "state"])
        .and_then(Value::as_str)
        .map(JobStatus::from_label)
        .unwrap_or(JobStatus::Queued);
    let records_count = first_of(fields, &["records_count", "recordsCount", "records"])
        .and_then(Value::as_u64)
        .unwrap_or(fallback_count);

    Some(BatchSubmission {
        job_id,
        status,
        records_count,
    })
}
