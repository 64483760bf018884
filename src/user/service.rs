//! User identity service.
//!
//! Orchestrates create-or-fetch, partial updates, verification and
//! listings on top of the graph store. Each operation maps to a single
//! store call; uniqueness under concurrent onboarding is delegated to the
//! store's atomic merge, never to a check-then-create here.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::graph::GraphStore;
use crate::user::update::{self, UpdateSet, UserUpdate};
use crate::user::{Device, NewUser, Scalar, User, UserKey, dob};

/// Validated creation request. Required fields are checked here, not
/// assumed from the transport layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateUser {
    pub mobile: String,
    pub first_name: String,
    pub last_name: String,
    pub refered_by_mobile: String,
    pub refered_by_name: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub aadhar_number: Option<String>,
    pub custom_fields: BTreeMap<String, Scalar>,
}

/// User manager.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn GraphStore>,
    otp_digits: u16,
}

impl UserService {
    pub fn new(store: Arc<dyn GraphStore>, otp_digits: u16) -> Self {
        Self { store, otp_digits }
    }

    /// Create the user, or return the existing node unchanged.
    ///
    /// The referral edge (and a placeholder referrer when the mobile is
    /// unknown) is established only on creation and never mutated by
    /// later calls.
    pub async fn create_or_fetch(
        &self,
        request: CreateUser,
    ) -> Result<(User, bool)> {
        required(&request.mobile, "mobile")?;
        required(&request.first_name, "first_name")?;
        required(&request.last_name, "last_name")?;
        required(&request.refered_by_mobile, "refered_by_mobile")?;

        let dob = match &request.dob {
            Some(dob) => dob::normalize(dob)?,
            None => None,
        };
        let custom_fields =
            update::sanitize_custom_fields(&request.custom_fields)
                .map_err(ServerError::from)?;

        let new = NewUser {
            id: Uuid::new_v4().to_string(),
            mobile: request.mobile,
            first_name: request.first_name,
            last_name: request.last_name,
            refered_by_mobile: request.refered_by_mobile,
            refered_by_name: request.refered_by_name,
            email: request.email,
            dob,
            address: request.address,
            city: request.city,
            state: request.state,
            aadhar_number: request.aadhar_number,
            custom_fields,
            created_at: Utc::now().to_rfc3339(),
        };

        self.store.merge_user(&new).await
    }

    /// Apply a partial update to the user matched by `key`.
    ///
    /// Returns the updated user and how many properties were written.
    /// An empty filtered set never reaches the store.
    pub async fn update(
        &self,
        key: &UserKey,
        update: &UserUpdate,
    ) -> Result<(User, usize)> {
        let set = UpdateSet::build(update).map_err(ServerError::from)?;
        if set.is_empty() {
            return Err(ServerError::NoFieldsToUpdate);
        }

        let user = self
            .store
            .apply_update(key, &set)
            .await?
            .ok_or(ServerError::UserNotFound)?;
        Ok((user, set.len()))
    }

    /// Mark the user verified, record device attributes and issue a fresh
    /// one-time code. Idempotent: re-verifying re-issues and overwrites
    /// the device fields.
    pub async fn verify(
        &self,
        mobile: &str,
        device: Device,
    ) -> Result<(User, String)> {
        required(mobile, "mobile")?;

        let user = self
            .store
            .mark_verified(mobile, &device)
            .await?
            .ok_or(ServerError::UserNotFound)?;
        Ok((user, generate_code(self.otp_digits)))
    }

    /// Users referred but not yet verified, carrying their referrer's
    /// denormalized name and mobile.
    pub async fn list_referrals(&self) -> Result<Vec<User>> {
        self.store.list_users(false).await
    }

    /// Verified customers.
    pub async fn list_customers(&self) -> Result<Vec<User>> {
        self.store.list_users(true).await
    }

    pub async fn get(&self, key: &UserKey) -> Result<User> {
        self.store
            .find_user(key)
            .await?
            .ok_or(ServerError::UserNotFound)
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(ServerError::MissingField(field))
    } else {
        Ok(value)
    }
}

/// Fixed-length random numeric code. Delivery is someone else's problem.
fn generate_code(digits: u16) -> String {
    let digits = digits.clamp(1, 9) as usize;
    let max = 10u64.pow(digits as u32);
    let code = rand::rngs::OsRng.gen_range(0..max);
    format!("{code:0digits$}")
}
