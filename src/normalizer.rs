//! Request normalization: UI form → canonical scoring payload.
//!
//! The normalizer is total. Partially filled forms are legal while the user
//! is editing, so malformed numbers degrade to `0` and unknown labels degrade
//! to the most conservative enum value instead of failing the request.

use crate::models::{CanonicalScorePayload, EmploymentType, FieldValue, LoanApplicationForm};
use rand::Rng;

/// Placeholder for free-text enums left empty by the user.
pub const UNSPECIFIED: &str = "unspecified";

/// DTI ratio precision (decimal places).
const DTI_SCALE: f64 = 10_000.0;

/// Source of application ids for forms submitted without one.
pub trait ApplicationIdSource {
    fn next_id(&self) -> String;
}

/// Produces ids of the form `APP-<0..9999>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomApplicationId;

impl ApplicationIdSource for RandomApplicationId {
    fn next_id(&self) -> String {
        format!("APP-{}", rand::thread_rng().gen_range(0..10_000))
    }
}

/// Always returns the same id. Useful in tests and replay tooling.
#[derive(Debug, Clone)]
pub struct FixedApplicationId(pub String);

impl ApplicationIdSource for FixedApplicationId {
    fn next_id(&self) -> String {
        self.0.clone()
    }
}

/// Turns loosely typed forms into [`CanonicalScorePayload`]s.
#[derive(Debug, Clone, Default)]
pub struct RequestNormalizer<I = RandomApplicationId> {
    ids: I,
}

impl<I: ApplicationIdSource> RequestNormalizer<I> {
    /// Creates a normalizer that synthesizes missing ids with `ids`.
    pub fn with_id_source(ids: I) -> Self {
        Self { ids }
    }

    /// Normalizes a form. Never fails and never produces NaN, infinity or
    /// negative numbers.
    pub fn normalize(&self, form: &LoanApplicationForm) -> CanonicalScorePayload {
        let income = coerce_amount(form.income.as_ref());
        let monthly_expenses = coerce_amount(form.monthly_expenses.as_ref());
        let existing_debt = coerce_amount(form.existing_debt.as_ref());

        let applicant_id = form
            .applicant_id
            .as_ref()
            .and_then(coerce_text)
            .unwrap_or_else(|| self.ids.next_id());

        CanonicalScorePayload {
            applicant_id,
            age: coerce_whole(form.age.as_ref()),
            income,
            loanamount: coerce_amount(form.requested_amount.as_ref()),
            interestrate: coerce_rate(form.interest_rate.as_ref()),
            loanterm: coerce_whole(form.term_months.as_ref()),
            dtiratio: debt_to_income(income, monthly_expenses, existing_debt),
            employmenttype: map_employment(form.employment_status.as_ref()),
            maritalstatus: canonical_label(form.marital_status.as_ref()),
            loanpurpose: canonical_label(form.loan_purpose.as_ref()),
            hasdependents: coerce_flag(form.has_dependents.as_ref()),
        }
    }
}

/// Normalizes `form` with random id synthesis.
pub fn normalize(form: &LoanApplicationForm) -> CanonicalScorePayload {
    RequestNormalizer::<RandomApplicationId>::default().normalize(form)
}

/// `(expenses + debt) / income`, rounded to 4 places; `0` when income is not positive.
pub fn debt_to_income(income: f64, monthly_expenses: f64, existing_debt: f64) -> f64 {
    let income = sanitize(income);
    if income <= 0.0 {
        return 0.0;
    }
    let obligations = sanitize(monthly_expenses) + sanitize(existing_debt);
    sanitize((obligations / income * DTI_SCALE).round() / DTI_SCALE)
}

/// Parses a field as a number. `None` for missing or unparseable input.
pub fn parse_number(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
        FieldValue::Text(text) => {
            let cleaned: String = text
                .trim()
                .chars()
                .filter(|c| *c != ',' && *c != '_')
                .collect();
            cleaned.parse::<f64>().ok()
        }
    }
}

/// Non-negative finite amount; anything else becomes `0`.
pub fn coerce_amount(value: Option<&FieldValue>) -> f64 {
    sanitize(value.and_then(parse_number).unwrap_or(0.0))
}

fn coerce_whole(value: Option<&FieldValue>) -> u32 {
    let n = coerce_amount(value).trunc();
    if n >= u32::MAX as f64 {
        u32::MAX
    } else {
        n as u32
    }
}

/// Interest rate as a fraction in `[0, 1]`. Values above 1 are read as percentages.
fn coerce_rate(value: Option<&FieldValue>) -> f64 {
    let rate = coerce_amount(value);
    let rate = if rate > 1.0 { rate / 100.0 } else { rate };
    rate.clamp(0.0, 1.0)
}

fn coerce_flag(value: Option<&FieldValue>) -> u8 {
    match value {
        Some(FieldValue::Flag(b)) => u8::from(*b),
        Some(FieldValue::Number(n)) => u8::from(n.is_finite() && *n > 0.0),
        Some(FieldValue::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "on" => 1,
            other => u8::from(other.parse::<f64>().map(|n| n > 0.0).unwrap_or(false)),
        },
        None => 0,
    }
}

fn coerce_text(value: &FieldValue) -> Option<String> {
    let text = match value {
        FieldValue::Text(text) => text.trim().to_string(),
        FieldValue::Number(n) if n.is_finite() => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn sanitize(n: f64) -> f64 {
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}

/// Lowercases and joins words with underscores: `"Self-Employed"` → `"self_employed"`.
pub fn slugify(label: &str) -> String {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

fn canonical_label(value: Option<&FieldValue>) -> String {
    let slug = value
        .and_then(coerce_text)
        .map(|text| slugify(&text))
        .unwrap_or_default();
    if slug.is_empty() {
        UNSPECIFIED.to_string()
    } else {
        slug
    }
}

/// Every employment label any UI version has emitted, keyed by slug.
const EMPLOYMENT_LABELS: &[(&str, EmploymentType)] = &[
    ("employed", EmploymentType::Salaried),
    ("salaried", EmploymentType::Salaried),
    ("full_time", EmploymentType::Salaried),
    ("fulltime", EmploymentType::Salaried),
    ("part_time", EmploymentType::Salaried),
    ("parttime", EmploymentType::Salaried),
    ("permanent", EmploymentType::Salaried),
    ("government", EmploymentType::Salaried),
    ("self_employed", EmploymentType::SelfEmployed),
    ("selfemployed", EmploymentType::SelfEmployed),
    ("freelance", EmploymentType::SelfEmployed),
    ("freelancer", EmploymentType::SelfEmployed),
    ("contractor", EmploymentType::SelfEmployed),
    ("business", EmploymentType::SelfEmployed),
    ("business_owner", EmploymentType::SelfEmployed),
    ("unemployed", EmploymentType::Unemployed),
    ("student", EmploymentType::Unemployed),
    ("retired", EmploymentType::Unemployed),
    ("none", EmploymentType::Unemployed),
];

/// Maps an employment label to the backend enum. Unknown or missing → `Unemployed`.
pub fn map_employment_label(label: &str) -> EmploymentType {
    let slug = slugify(label);
    EMPLOYMENT_LABELS
        .iter()
        .find(|(known, _)| *known == slug)
        .map(|(_, mapped)| *mapped)
        .unwrap_or_else(|| {
            tracing::debug!("Unrecognized employment label '{}', using unemployed", label);
            EmploymentType::Unemployed
        })
}

fn map_employment(value: Option<&FieldValue>) -> EmploymentType {
    match value.and_then(coerce_text) {
        Some(label) => map_employment_label(&label),
        None => EmploymentType::Unemployed,
    }
}
