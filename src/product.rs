//! Product catalog contract.
//!
//! Products are read-only from this service's perspective; the catalog is
//! maintained elsewhere and only listed or fetched here.

use serde::{Deserialize, Serialize};

/// Product as saved on the graph (`PRODUCT:BUFFALO` node).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(
        rename = "milkYield",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub milk_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(
        rename = "inStock",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffalo_images: Vec<String>,
}
