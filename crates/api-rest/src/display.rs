//! Field display formatting.
//!
//! Presentation-side rendering of worklist summary fields. Fields used in
//! the result table vary by deployment, so rendering is a single polymorphic
//! capability keyed by field kind rather than a fixed template. None of this
//! is worklist logic; the core hands over raw summaries.

use calllist_core::PatientSummary;
use calllist_types::CallOutcome;

/// A renderable field of a [`PatientSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryField {
    Name,
    Line,
    PrimaryPhone,
    AddedAt,
    LastCalledAt,
    LastOutcome,
}

/// Renders one summary field as display text.
pub fn format_field(field: SummaryField, summary: &PatientSummary) -> String {
    match field {
        SummaryField::Name => summary.name.to_string(),
        SummaryField::Line => summary.line.to_string(),
        SummaryField::PrimaryPhone => summary
            .primary_phone
            .as_deref()
            .map(format_phone)
            .unwrap_or_default(),
        SummaryField::AddedAt => summary
            .added_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default(),
        SummaryField::LastCalledAt => summary
            .last_called_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default(),
        SummaryField::LastOutcome => summary
            .last_outcome
            .map(outcome_text)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Human wording for a recorded outcome, as shown in the completed-calls
/// table.
pub fn outcome_text(outcome: CallOutcome) -> &'static str {
    match outcome {
        CallOutcome::Reached => "Reached the patient",
        CallOutcome::Voicemail => "Left a voicemail for the patient",
        CallOutcome::NotReached => "Couldn't reach the patient",
    }
}

/// Renders a primary contact number for display.
///
/// Ten-digit NANP numbers become `(555) 123-4567`; an eleven-digit number
/// with a leading 1 drops the country code first. Anything else (short
/// codes, international numbers, free text) passes through untouched.
pub fn format_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('1') => &digits[1..],
        _ => return raw.to_string(),
    };

    format!(
        "({}) {}-{}",
        &national[..3],
        &national[3..6],
        &national[6..]
    )
}
