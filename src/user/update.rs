//! Partial-update construction.
//!
//! Translates an update payload into an ordered list of
//! `(property, value)` pairs consumed by a parameterized query. Unset
//! fields are skipped, immutable keys never appear, and values are always
//! bound as parameters, never spliced into query text.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::user::{SCHEMA_FIELDS, Scalar, dob};

/// Custom-field keys must look like plain identifiers once sanitized, so
/// they are safe to splice as property names.
static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Partial user update payload. Absent fields stay untouched.
///
/// `mobile`, `id` and `verified` are deliberately inexpressible here:
/// the natural key and the identifier are immutable, and `verified` only
/// transitions through the verify operation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Email must be formatted."))]
    pub email: Option<String>,
    /// `MM-DD-YYYY` or canonical `YYYY-MM-DD`.
    pub dob: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub aadhar_number: Option<String>,
    pub custom_fields: Option<BTreeMap<String, Scalar>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Dob(#[from] dob::InvalidDateFormat),
    #[error("custom field key `{0}` is not a valid property name")]
    BadKey(String),
}

/// Ordered `(property, value)` pairs for one partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSet {
    entries: Vec<(String, Scalar)>,
}

impl UpdateSet {
    /// Build the filtered pair list from a payload.
    ///
    /// Field order is deterministic: schema fields in declaration order,
    /// then custom fields in sorted key order. An empty result means the
    /// caller must report "nothing to update" without touching the store.
    pub fn build(update: &UserUpdate) -> Result<Self, UpdateError> {
        let mut set = UpdateSet::default();

        set.push_opt("first_name", &update.first_name);
        set.push_opt("last_name", &update.last_name);
        set.push_opt("email", &update.email);
        if let Some(dob) = &update.dob {
            match dob::normalize(dob)? {
                Some(canonical) => set.push("dob", canonical.into()),
                None => set.push("dob", Scalar::Null),
            }
        }
        set.push_opt("address", &update.address);
        set.push_opt("city", &update.city);
        set.push_opt("state", &update.state);
        set.push_opt("aadhar_number", &update.aadhar_number);

        if let Some(custom) = &update.custom_fields {
            for (key, value) in custom {
                if let Some(key) = sanitize_key(key)? {
                    set.push(&key, value.clone());
                }
            }
        }

        Ok(set)
    }

    pub(crate) fn push(&mut self, field: &str, value: Scalar) {
        self.entries.push((field.to_owned(), value));
    }

    pub(crate) fn push_opt(&mut self, field: &str, value: &Option<String>) {
        if let Some(value) = value {
            self.push(field, value.as_str().into());
        }
    }

    pub fn entries(&self) -> &[(String, Scalar)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Sanitize a whole custom-field map, used at creation time where the
/// same key rules apply.
pub(crate) fn sanitize_custom_fields(
    fields: &BTreeMap<String, Scalar>,
) -> Result<BTreeMap<String, Scalar>, UpdateError> {
    let mut sanitized = BTreeMap::new();
    for (key, value) in fields {
        if let Some(key) = sanitize_key(key)? {
            sanitized.insert(key, value.clone());
        }
    }
    Ok(sanitized)
}

/// Sanitize a custom-field key the legacy way (spaces and dashes become
/// underscores), then vet it. Keys shadowing schema properties are
/// dropped; keys that still do not form an identifier are rejected.
fn sanitize_key(key: &str) -> Result<Option<String>, UpdateError> {
    let sanitized = key.replace([' ', '-'], "_");

    if SCHEMA_FIELDS.contains(&sanitized.as_str()) {
        return Ok(None);
    }
    if !IDENT.is_match(&sanitized) {
        return Err(UpdateError::BadKey(key.to_owned()));
    }

    Ok(Some(sanitized))
}
