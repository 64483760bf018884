//! Date-of-birth normalization.
//!
//! Input arrives as `MM-DD-YYYY` (or already canonical); the stored
//! representation is always `YYYY-MM-DD`. Responses fetched by id render
//! the legacy `DD-MM-YYYY` display form.

use chrono::NaiveDate;

const INPUT_FORMAT: &str = "%m-%d-%Y";
const CANONICAL_FORMAT: &str = "%Y-%m-%d";
const DISPLAY_FORMAT: &str = "%d-%m-%Y";

/// The given string is not a real calendar date in an accepted format.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("`{0}` is not a valid MM-DD-YYYY date")]
pub struct InvalidDateFormat(pub String);

/// Canonicalize a date-of-birth string.
///
/// Empty input is valid and yields `None`. Out-of-range calendar values
/// (month 13, February 30th) are rejected.
pub fn normalize(input: &str) -> Result<Option<String>, InvalidDateFormat> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let date = NaiveDate::parse_from_str(input, INPUT_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(input, CANONICAL_FORMAT))
        .map_err(|_| InvalidDateFormat(input.to_owned()))?;

    Ok(Some(date.format(CANONICAL_FORMAT).to_string()))
}

/// Render a canonical date as `DD-MM-YYYY`.
///
/// Non-canonical stored values pass through untouched.
pub fn display(canonical: &str) -> String {
    match NaiveDate::parse_from_str(canonical, CANONICAL_FORMAT) {
        Ok(date) => date.format(DISPLAY_FORMAT).to_string(),
        Err(_) => canonical.to_owned(),
    }
}
