//! Graph session provider.
//!
//! [`GraphStore`] is the seam between the identity logic and the backing
//! property graph: it exposes exactly the fixed set of operations the
//! service needs, not a general query surface. The production
//! implementation is [`Neo4jStore`]; tests run against an in-memory mock.

pub mod neo4j;

#[cfg(test)]
pub mod mock;

pub use neo4j::Neo4jStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::product::Product;
use crate::purchase::NewPurchase;
use crate::user::update::UpdateSet;
use crate::user::{Device, NewUser, User, UserKey};

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Atomic create-or-fetch keyed on the unique `mobile` property.
    ///
    /// Returns the stored user and whether this call created it. Existing
    /// users are returned unchanged; concurrent calls for the same mobile
    /// may each observe `created == false` but never produce two nodes.
    /// The referral edge (and placeholder referrer if needed) commits
    /// together with the user, never separately.
    async fn merge_user(&self, user: &NewUser) -> Result<(User, bool)>;

    async fn find_user(&self, key: &UserKey) -> Result<Option<User>>;

    /// Apply a non-empty update set to one user. `None` when the key does
    /// not match any node.
    async fn apply_update(
        &self,
        key: &UserKey,
        set: &UpdateSet,
    ) -> Result<Option<User>>;

    /// Set `verified = true` and record device attributes.
    async fn mark_verified(
        &self,
        mobile: &str,
        device: &Device,
    ) -> Result<Option<User>>;

    /// All users with the given verification state. Users with no
    /// `verified` property count as unverified.
    async fn list_users(&self, verified: bool) -> Result<Vec<User>>;

    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn find_product(&self, product_id: &str) -> Result<Option<Product>>;

    /// Record a purchase for the user with `mobile`. `false` when no such
    /// user exists (nothing is written).
    async fn record_purchase(
        &self,
        mobile: &str,
        purchase: &NewPurchase,
    ) -> Result<bool>;
}
