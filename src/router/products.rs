//! Product catalog HTTP API. Read-only.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::product::Product;

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub statuscode: u16,
    pub status: String,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub statuscode: u16,
    pub status: String,
    pub product: Product,
}

async fn list(State(state): State<AppState>) -> Result<Json<ListResponse>> {
    let products = state.store.list_products().await?;

    Ok(Json(ListResponse {
        statuscode: 200,
        status: "success".to_owned(),
        products,
    }))
}

async fn get_one(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<DetailResponse>> {
    let product = state
        .store
        .find_product(&product_id)
        .await?
        .ok_or(ServerError::ProductNotFound)?;

    Ok(Json(DetailResponse {
        statuscode: 200,
        status: "success".to_owned(),
        product,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{product_id}", get(get_one))
}
