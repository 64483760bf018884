//! Users-related HTTP API.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::service::CreateUser;
use crate::user::update::UserUpdate;
use crate::user::{Device, Scalar, User, UserKey};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateBody {
    #[validate(length(min = 1, message = "Mobile is required."))]
    pub mobile: String,
    #[validate(length(min = 1, message = "First name is required."))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required."))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Referrer mobile is required."))]
    pub refered_by_mobile: String,
    pub refered_by_name: Option<String>,
    #[validate(email(message = "Email must be formatted."))]
    pub email: Option<String>,
    pub dob: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub aadhar_number: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Scalar>,
}

impl From<CreateBody> for CreateUser {
    fn from(body: CreateBody) -> Self {
        CreateUser {
            mobile: body.mobile,
            first_name: body.first_name,
            last_name: body.last_name,
            refered_by_mobile: body.refered_by_mobile,
            refered_by_name: body.refered_by_name,
            email: body.email,
            dob: body.dob,
            address: body.address,
            city: body.city,
            state: body.state,
            aadhar_number: body.aadhar_number,
            custom_fields: body.custom_fields,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyBody {
    #[validate(length(min = 1, message = "Mobile is required."))]
    pub mobile: String,
    #[validate(length(min = 1, message = "Device ID is required."))]
    pub device_id: String,
    #[validate(length(min = 1, message = "Device model is required."))]
    pub device_model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub statuscode: u16,
    pub status: String,
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub statuscode: u16,
    pub status: String,
    pub message: String,
    pub updated_fields: usize,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub statuscode: u16,
    pub status: String,
    pub message: String,
    pub otp: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub statuscode: u16,
    pub status: String,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub statuscode: u16,
    pub status: String,
    pub user: User,
}

const SUCCESS: &str = "success";

/// Create the user, or return the stored one untouched when the mobile is
/// already known. Replays answer 200 instead of 201.
async fn create(
    State(state): State<AppState>,
    Valid(body): Valid<CreateBody>,
) -> Result<(StatusCode, Json<CreateResponse>)> {
    let (user, created) =
        state.users().create_or_fetch(body.into()).await?;

    let (code, message) = if created {
        (StatusCode::CREATED, "User created or updated")
    } else {
        (StatusCode::OK, "User already exists")
    };

    Ok((
        code,
        Json(CreateResponse {
            statuscode: code.as_u16(),
            status: SUCCESS.to_owned(),
            message: message.to_owned(),
            user,
        }),
    ))
}

async fn update_by_mobile(
    State(state): State<AppState>,
    Path(mobile): Path<String>,
    Valid(body): Valid<UserUpdate>,
) -> Result<Json<UpdateResponse>> {
    let (user, updated_fields) = state
        .users()
        .update(&UserKey::Mobile(mobile), &body)
        .await?;

    Ok(Json(UpdateResponse {
        statuscode: 200,
        status: SUCCESS.to_owned(),
        message: "User updated successfully".to_owned(),
        updated_fields,
        user,
    }))
}

async fn update_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Valid(body): Valid<UserUpdate>,
) -> Result<Json<UpdateResponse>> {
    let (user, updated_fields) =
        state.users().update(&UserKey::Id(user_id), &body).await?;

    Ok(Json(UpdateResponse {
        statuscode: 200,
        status: SUCCESS.to_owned(),
        message: "User updated successfully".to_owned(),
        updated_fields,
        user: user.with_display_dob(),
    }))
}

/// Mark the user verified and hand back a fresh one-time code.
async fn verify(
    State(state): State<AppState>,
    Valid(body): Valid<VerifyBody>,
) -> Result<Json<VerifyResponse>> {
    let (user, otp) = state
        .users()
        .verify(
            &body.mobile,
            Device {
                id: body.device_id,
                model: body.device_model,
            },
        )
        .await?;

    Ok(Json(VerifyResponse {
        statuscode: 200,
        status: SUCCESS.to_owned(),
        message: "New user verified".to_owned(),
        otp,
        user,
    }))
}

/// Referred users still waiting on verification.
async fn referrals(
    State(state): State<AppState>,
) -> Result<Json<ListResponse>> {
    let users = state.users().list_referrals().await?;

    Ok(Json(ListResponse {
        statuscode: 200,
        status: SUCCESS.to_owned(),
        users,
    }))
}

async fn customers(
    State(state): State<AppState>,
) -> Result<Json<ListResponse>> {
    let users = state.users().list_customers().await?;

    Ok(Json(ListResponse {
        statuscode: 200,
        status: SUCCESS.to_owned(),
        users,
    }))
}

async fn get_by_mobile(
    State(state): State<AppState>,
    Path(mobile): Path<String>,
) -> Result<Json<DetailResponse>> {
    let user = state.users().get(&UserKey::Mobile(mobile)).await?;

    Ok(Json(DetailResponse {
        statuscode: 200,
        status: SUCCESS.to_owned(),
        user,
    }))
}

/// Id-based fetch; `dob` comes back in `DD-MM-YYYY` display form.
async fn get_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<DetailResponse>> {
    let user = state.users().get(&UserKey::Id(user_id)).await?;

    Ok(Json(DetailResponse {
        statuscode: 200,
        status: SUCCESS.to_owned(),
        user: user.with_display_dob(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/verify", post(verify))
        .route("/referrals", get(referrals))
        .route("/customers", get(customers))
        .route("/{mobile}", get(get_by_mobile).put(update_by_mobile))
        .route("/id/{user_id}", get(get_by_id).put(update_by_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app, make_request, router};
    use axum::http::Method;
    use http_body_util::BodyExt;
    use serde_json::json;

    fn create_body(mobile: &str) -> CreateBody {
        CreateBody {
            mobile: mobile.to_owned(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            refered_by_mobile: "9876543211".into(),
            refered_by_name: Some("Jane Doe".into()),
            email: None,
            dob: None,
            address: None,
            city: None,
            state: None,
            aadhar_number: None,
            custom_fields: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_handler() {
        let state = router::state();
        let app = app(state.clone());

        let response = make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!(create_body("9876543210")).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: CreateResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.statuscode, 201);
        assert_eq!(body.status, "success");
        assert_eq!(body.user.mobile, "9876543210");
        assert!(!body.user.verified);

        // replay answers 200 without touching the stored node.
        let response = make_request(
            app,
            Method::POST,
            "/users",
            json!(create_body("9876543210")).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: CreateResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.message, "User already exists");
    }

    #[tokio::test]
    async fn test_create_with_blank_first_name() {
        let app = app(router::state());

        let mut req_body = create_body("9876543210");
        req_body.first_name = String::new();
        let response = make_request(
            app,
            Method::POST,
            "/users",
            json!(req_body).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "error");
        assert!(body["errors"].get("first_name").is_some());
    }

    #[tokio::test]
    async fn test_update_by_mobile_handler() {
        let app = app(router::state());

        make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!(create_body("9876543210")).to_string(),
        )
        .await;

        let response = make_request(
            app,
            Method::PUT,
            "/users/9876543210",
            json!({"city": "Pune"}).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: UpdateResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.updated_fields, 1);
        assert_eq!(body.user.city.as_deref(), Some("Pune"));
        assert_eq!(body.user.first_name, "John");
    }

    #[tokio::test]
    async fn test_update_with_no_effective_fields() {
        let app = app(router::state());

        make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!(create_body("9876543210")).to_string(),
        )
        .await;

        let response = make_request(
            app,
            Method::PUT,
            "/users/9876543210",
            json!({}).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let app = app(router::state());

        let response = make_request(
            app,
            Method::PUT,
            "/users/0000000000",
            json!({"city": "Pune"}).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_by_id_formats_dob() {
        let app = app(router::state());

        let mut req_body = create_body("9876543210");
        req_body.dob = Some("01-15-1990".into());
        let response = make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!(req_body).to_string(),
        )
        .await;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let created: CreateResponse = serde_json::from_slice(&body).unwrap();

        let response = make_request(
            app,
            Method::PUT,
            &format!("/users/id/{}", created.user.id),
            json!({"address": "123 Main St"}).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: UpdateResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.user.dob.as_deref(), Some("15-01-1990"));
        assert_eq!(body.user.address.as_deref(), Some("123 Main St"));
    }

    #[tokio::test]
    async fn test_verify_handler() {
        let app = app(router::state());

        make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!(create_body("9876543210")).to_string(),
        )
        .await;

        let response = make_request(
            app,
            Method::POST,
            "/users/verify",
            json!({
                "mobile": "9876543210",
                "device_id": "device123",
                "device_model": "iPhone 12"
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: VerifyResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.otp.len(), 6);
        assert!(body.otp.chars().all(|c| c.is_ascii_digit()));
        assert!(body.user.verified);
        assert_eq!(body.user.device_model.as_deref(), Some("iPhone 12"));
    }

    #[tokio::test]
    async fn test_verify_unknown_mobile() {
        let app = app(router::state());

        let response = make_request(
            app,
            Method::POST,
            "/users/verify",
            json!({
                "mobile": "0000000000",
                "device_id": "device123",
                "device_model": "iPhone 12"
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_handlers() {
        let app = app(router::state());

        let mut req_body = create_body("9876543210");
        req_body.dob = Some("01-15-1990".into());
        let response = make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!(req_body).to_string(),
        )
        .await;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let created: CreateResponse = serde_json::from_slice(&body).unwrap();

        let response = make_request(
            app.clone(),
            Method::GET,
            "/users/9876543210",
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: DetailResponse = serde_json::from_slice(&body).unwrap();
        // mobile fetch keeps the canonical form.
        assert_eq!(body.user.dob.as_deref(), Some("1990-01-15"));

        let response = make_request(
            app.clone(),
            Method::GET,
            &format!("/users/id/{}", created.user.id),
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: DetailResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.user.dob.as_deref(), Some("15-01-1990"));

        let response = make_request(
            app,
            Method::GET,
            "/users/0000000000",
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listing_handlers() {
        let app = app(router::state());

        make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!(create_body("1111111111")).to_string(),
        )
        .await;
        make_request(
            app.clone(),
            Method::POST,
            "/users/verify",
            json!({
                "mobile": "1111111111",
                "device_id": "device123",
                "device_model": "iPhone 12"
            })
            .to_string(),
        )
        .await;
        make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!(create_body("2222222222")).to_string(),
        )
        .await;

        let response = make_request(
            app.clone(),
            Method::GET,
            "/users/referrals",
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: ListResponse = serde_json::from_slice(&body).unwrap();
        assert!(body.users.iter().any(|user| user.mobile == "2222222222"));
        assert!(body.users.iter().all(|user| user.mobile != "1111111111"));

        let response = make_request(
            app,
            Method::GET,
            "/users/customers",
            String::new(),
        )
        .await;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: ListResponse = serde_json::from_slice(&body).unwrap();
        assert!(body.users.iter().any(|user| user.mobile == "1111111111"));
        assert!(body.users.iter().all(|user| user.mobile != "2222222222"));
    }
}
