//! Purchase recording contract.
//!
//! A purchase links a User to a Purchase node through a `PURCHASED` edge
//! carrying item, details, price paid and a timestamp. Written by the
//! purchase collaborator; the identity core never mutates it.

use serde::{Deserialize, Serialize};

/// Payload for one purchase event. The node id is generated at insert.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub item: String,
    pub details: String,
    pub price: Option<f64>,
    /// RFC 3339 timestamp.
    pub purchased_at: String,
}
