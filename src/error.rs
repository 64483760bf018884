//! Error handler for buffalokart.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::user::dob::InvalidDateFormat;
use crate::user::update::UpdateError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDateFormat),

    #[error("custom field key `{0}` is not a valid property name")]
    BadCustomKey(String),

    #[error("no fields to update")]
    NoFieldsToUpdate,

    #[error("user not found")]
    UserNotFound,

    #[error("product not found")]
    ProductNotFound,

    #[error("user already exists: {0}")]
    DuplicateUser(String),

    #[error("graph store request failed: {0}")]
    Graph(#[from] neo4rs::Error),

    #[error("malformed graph record: {0}")]
    Decode(#[from] neo4rs::DeError),

    #[error("internal server error, {details}")]
    Internal { details: String },
}

impl From<UpdateError> for ServerError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::Dob(err) => ServerError::InvalidDate(err),
            UpdateError::BadKey(key) => ServerError::BadCustomKey(key),
        }
    }
}

/// Standardized error envelope returned to the boundary layer.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    statuscode: u16,
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.statuscode = code.as_u16();
        self
    }

    /// Update `message` field.
    pub fn message(mut self, message: &str) -> Self {
        self.message = message.into();
        self
    }

    /// Attribute the error to a single offending field.
    pub fn field(mut self, field: &str, reason: &str) -> Self {
        self.errors
            .get_or_insert_with(BTreeMap::new)
            .entry(field.to_owned())
            .or_default()
            .push(reason.to_owned());
        self
    }

    /// Automatically fill `errors` from validator output.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.statuscode)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            statuscode: StatusCode::BAD_REQUEST.as_u16(),
            status: "error",
            message: String::default(),
            errors: None,
        }
    }
}

fn parse_validation_errors(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .iter()
        .map(|(field, issues)| {
            (
                field.to_string(),
                issues.iter().map(|issue| issue.to_string()).collect(),
            )
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default().message(&self.to_string());

        let response = match &self {
            ServerError::Validation(validation_errors) => response.errors(validation_errors),

            ServerError::Axum(rejection) => response.message(&rejection.body_text()),

            ServerError::MissingField(field) => {
                response.field(field, "field is required and must be non-empty")
            }

            ServerError::InvalidDate(err) => response.field("dob", &err.to_string()),

            ServerError::BadCustomKey(key) => response.field("custom_fields", key),

            ServerError::NoFieldsToUpdate => response.message("Nothing to update"),

            ServerError::UserNotFound | ServerError::ProductNotFound => {
                response.status(StatusCode::NOT_FOUND)
            }

            ServerError::DuplicateUser(mobile) => response
                .status(StatusCode::CONFLICT)
                .field("mobile", mobile),

            ServerError::Graph(err) => {
                tracing::error!(error = %err, "graph store unreachable or failing");
                response
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .message("Graph store unavailable")
            }

            ServerError::Decode(err) => {
                tracing::error!(error = %err, "graph record does not match schema");
                response
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .message("Internal server error")
            }

            ServerError::Internal { details } => {
                tracing::error!(%details, "server returned 500 status");
                response
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .message("Internal server error")
            }
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "statuscode": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "status": "error",
                "message": "Internal server error",
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let response = ResponseError::default()
            .status(StatusCode::NOT_FOUND)
            .message("user not found");
        let body = serde_json::to_value(&response).unwrap();

        assert_eq!(body["statuscode"], 404);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "user not found");
        assert!(body.get("errors").is_none());
    }

    #[test]
    fn test_envelope_field_attribution() {
        let response = ResponseError::default().field("mobile", "required");
        let body = serde_json::to_value(&response).unwrap();

        assert_eq!(body["errors"]["mobile"][0], "required");
    }

    #[tokio::test]
    async fn test_unreachable_store_maps_to_503() {
        use http_body_util::BodyExt;

        let response =
            ServerError::Graph(neo4rs::Error::ConnectionError).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["statuscode"], 503);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Graph store unavailable");
    }
}
