//! HTTP surface over the identity, product and purchase services.

pub mod products;
pub mod purchases;
pub mod users;

use axum::extract::{FromRequest, Request};
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::ServerError;

/// JSON extractor running `validator` checks before the handler sees the
/// body. Both malformed JSON and failed validation come back as the
/// standardized error envelope.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

/// Liveness probe.
async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_owned(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/purchases", purchases::router())
}

/// MUST NEVER be used in production.
#[cfg(test)]
pub(crate) fn state() -> AppState {
    mock_state().1
}

/// Same, but keeps a handle on the store for seeding and inspection.
#[cfg(test)]
pub(crate) fn mock_state()
-> (std::sync::Arc<crate::graph::mock::MockStore>, AppState) {
    use std::sync::Arc;

    let store = Arc::new(crate::graph::mock::MockStore::default());
    (
        Arc::clone(&store),
        AppState {
            config: Arc::new(crate::config::Configuration::default()),
            store,
        },
    )
}
