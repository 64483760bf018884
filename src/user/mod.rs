pub mod dob;
pub mod service;
pub mod update;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Property names fixed by the User node schema. Custom fields may not
/// shadow any of these.
pub const SCHEMA_FIELDS: [&str; 16] = [
    "created_at",
    "id",
    "mobile",
    "first_name",
    "last_name",
    "email",
    "verified",
    "dob",
    "address",
    "city",
    "state",
    "aadhar_number",
    "refered_by_mobile",
    "refered_by_name",
    "device_id",
    "device_model",
];

/// A single schemaless property value.
///
/// Variant order matters for untagged deserialization: `Null` and `Bool`
/// before numbers, `Int` before `Float`, `Str` last.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

/// User as saved on the graph.
///
/// `id` is assigned once at creation and never reassigned; `mobile` is the
/// natural key, unique across all User nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub mobile: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub verified: bool,
    /// Canonical `YYYY-MM-DD` string, or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aadhar_number: Option<String>,
    /// Denormalized referrer attributes captured at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refered_by_mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refered_by_name: Option<String>,
    /// Set only on verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    /// Schemaless extension point, stored as flat node properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, Scalar>,
    #[serde(default)]
    pub created_at: String,
}

impl User {
    /// Replace the canonical `dob` with its `DD-MM-YYYY` display form.
    pub fn with_display_dob(mut self) -> Self {
        self.dob = self.dob.as_deref().map(dob::display);
        self
    }
}

/// Fully resolved payload for an atomic create-or-fetch.
///
/// `id` is pre-generated; when the mobile already exists the stored node
/// keeps its own id, which is how creation is detected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewUser {
    pub id: String,
    pub mobile: String,
    pub first_name: String,
    pub last_name: String,
    pub refered_by_mobile: String,
    pub refered_by_name: Option<String>,
    pub email: Option<String>,
    /// Already normalized to canonical form.
    pub dob: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub aadhar_number: Option<String>,
    pub custom_fields: BTreeMap<String, Scalar>,
    pub created_at: String,
}

/// Device attributes recorded at verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub model: String,
}

/// Lookup key for a single User node.
#[derive(Debug, Clone, PartialEq)]
pub enum UserKey {
    Mobile(String),
    Id(String),
}

impl UserKey {
    /// Property name matched by this key.
    pub fn field(&self) -> &'static str {
        match self {
            UserKey::Mobile(_) => "mobile",
            UserKey::Id(_) => "id",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            UserKey::Mobile(value) | UserKey::Id(value) => value,
        }
    }
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}={}", self.field(), self.value())
    }
}
