//! In-memory [`GraphStore`] for tests.
//!
//! Mirrors the Cypher semantics of the Neo4j implementation over
//! `tokio::sync::RwLock` collections so service and router logic can be
//! exercised without a running store.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::graph::GraphStore;
use crate::product::Product;
use crate::purchase::NewPurchase;
use crate::user::update::UpdateSet;
use crate::user::{Device, NewUser, Scalar, User, UserKey};

#[derive(Default)]
pub struct MockStore {
    users: RwLock<Vec<User>>,
    /// `(referred mobile, referrer mobile)` edges, one per creation.
    referrals: RwLock<Vec<(String, String)>>,
    products: RwLock<Vec<Product>>,
    purchases: RwLock<Vec<(String, NewPurchase)>>,
}

impl MockStore {
    pub async fn seed_product(&self, product: Product) {
        self.products.write().await.push(product);
    }

    pub async fn purchase_count(&self) -> usize {
        self.purchases.read().await.len()
    }

    pub async fn referral_edges(&self) -> Vec<(String, String)> {
        self.referrals.read().await.clone()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

fn matches(user: &User, key: &UserKey) -> bool {
    match key {
        UserKey::Mobile(mobile) => user.mobile == *mobile,
        UserKey::Id(id) => user.id == *id,
    }
}

/// Apply one `SET` pair the way Cypher would: schema fields by name,
/// anything else lands in `custom_fields`; `null` removes the property.
fn apply_field(user: &mut User, field: &str, value: &Scalar) {
    let text = || value.as_str().unwrap_or_default().to_owned();
    let opt = || match value {
        Scalar::Null => None,
        other => other.as_str().map(str::to_owned),
    };

    match field {
        "first_name" => user.first_name = text(),
        "last_name" => user.last_name = text(),
        "email" => user.email = opt(),
        "dob" => user.dob = opt(),
        "address" => user.address = opt(),
        "city" => user.city = opt(),
        "state" => user.state = opt(),
        "aadhar_number" => user.aadhar_number = opt(),
        "refered_by_mobile" => user.refered_by_mobile = opt(),
        "refered_by_name" => user.refered_by_name = opt(),
        _ => {
            if value.is_null() {
                user.custom_fields.remove(field);
            } else {
                user.custom_fields.insert(field.to_owned(), value.clone());
            }
        },
    }
}

#[async_trait]
impl GraphStore for MockStore {
    async fn merge_user(&self, new: &NewUser) -> Result<(User, bool)> {
        let mut users = self.users.write().await;

        if let Some(existing) =
            users.iter().find(|user| user.mobile == new.mobile)
        {
            return Ok((existing.clone(), false));
        }

        let user = User {
            id: new.id.clone(),
            mobile: new.mobile.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            email: new.email.clone(),
            verified: false,
            dob: new.dob.clone(),
            address: new.address.clone(),
            city: new.city.clone(),
            state: new.state.clone(),
            aadhar_number: new.aadhar_number.clone(),
            refered_by_mobile: Some(new.refered_by_mobile.clone()),
            refered_by_name: new.refered_by_name.clone(),
            device_id: None,
            device_model: None,
            custom_fields: new.custom_fields.clone(),
            created_at: new.created_at.clone(),
        };
        users.push(user.clone());

        // placeholder referrer, adopted later if that mobile registers.
        if !users.iter().any(|u| u.mobile == new.refered_by_mobile) {
            users.push(User {
                id: Uuid::new_v4().to_string(),
                mobile: new.refered_by_mobile.clone(),
                first_name: new.refered_by_name.clone().unwrap_or_default(),
                created_at: new.created_at.clone(),
                ..Default::default()
            });
        }
        self.referrals
            .write()
            .await
            .push((new.mobile.clone(), new.refered_by_mobile.clone()));

        Ok((user, true))
    }

    async fn find_user(&self, key: &UserKey) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| matches(user, key))
            .cloned())
    }

    async fn apply_update(
        &self,
        key: &UserKey,
        set: &UpdateSet,
    ) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|user| matches(user, key))
        else {
            return Ok(None);
        };

        for (field, value) in set.entries() {
            apply_field(user, field, value);
        }
        Ok(Some(user.clone()))
    }

    async fn mark_verified(
        &self,
        mobile: &str,
        device: &Device,
    ) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|user| user.mobile == mobile)
        else {
            return Ok(None);
        };

        user.verified = true;
        user.device_id = Some(device.id.clone());
        user.device_model = Some(device.model.clone());
        Ok(Some(user.clone()))
    }

    async fn list_users(&self, verified: bool) -> Result<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|user| user.verified == verified)
            .cloned()
            .collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.read().await.clone())
    }

    async fn find_product(&self, product_id: &str) -> Result<Option<Product>> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|product| product.id == product_id)
            .cloned())
    }

    async fn record_purchase(
        &self,
        mobile: &str,
        purchase: &NewPurchase,
    ) -> Result<bool> {
        if !self.users.read().await.iter().any(|user| user.mobile == mobile) {
            return Ok(false);
        }
        self.purchases
            .write()
            .await
            .push((mobile.to_owned(), purchase.clone()));
        Ok(true)
    }
}
