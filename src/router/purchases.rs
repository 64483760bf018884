//! Purchase recording HTTP API.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::purchase::NewPurchase;
use crate::router::Valid;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    // legacy clients send the capitalized form.
    #[serde(alias = "User_mobile")]
    #[validate(length(min = 1, message = "Mobile is required."))]
    pub user_mobile: String,
    #[validate(length(min = 1, message = "Item is required."))]
    pub item: String,
    pub details: String,
    pub price: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub statuscode: u16,
    pub status: String,
    pub message: String,
}

async fn create(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let purchase = NewPurchase {
        item: body.item,
        details: body.details,
        price: body.price,
        purchased_at: Utc::now().to_rfc3339(),
    };

    let recorded = state
        .store
        .record_purchase(&body.user_mobile, &purchase)
        .await?;
    if !recorded {
        return Err(ServerError::UserNotFound);
    }

    Ok(Json(Response {
        statuscode: 200,
        status: "success".to_owned(),
        message: "Purchase recorded".to_owned(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app, make_request, router};
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_purchase() {
        let (store, state) = router::mock_state();
        let app = app(state);

        make_request(
            app.clone(),
            Method::POST,
            "/users",
            json!({
                "mobile": "9876543210",
                "first_name": "John",
                "last_name": "Doe",
                "refered_by_mobile": "9876543211"
            })
            .to_string(),
        )
        .await;

        let response = make_request(
            app,
            Method::POST,
            "/purchases",
            json!({
                "User_mobile": "9876543210",
                "item": "Buffalo Milk",
                "details": "1 liter organic buffalo milk"
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.message, "Purchase recorded");
        assert_eq!(store.purchase_count().await, 1);
    }

    #[tokio::test]
    async fn test_purchase_for_unknown_user() {
        let (store, state) = router::mock_state();
        let app = app(state);

        let response = make_request(
            app,
            Method::POST,
            "/purchases",
            json!({
                "user_mobile": "0000000000",
                "item": "Buffalo Milk",
                "details": "1 liter organic buffalo milk"
            })
            .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(store.purchase_count().await, 0);
    }
}
