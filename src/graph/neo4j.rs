//! Neo4j-backed [`GraphStore`].
//!
//! One pooled [`Graph`] handle per process, initialized explicitly at
//! startup and torn down on drop. Every operation is a single
//! parameterized Cypher statement; the upsert relies on the unique
//! constraint on `User.mobile` so concurrent callers can never produce
//! two nodes for one number.

use std::collections::BTreeMap;

use async_trait::async_trait;
use neo4rs::{Graph, Node, Query, query};
use uuid::Uuid;

use crate::config;
use crate::error::{Result, ServerError};
use crate::graph::GraphStore;
use crate::product::Product;
use crate::purchase::NewPurchase;
use crate::user::update::UpdateSet;
use crate::user::{Device, NewUser, SCHEMA_FIELDS, Scalar, User, UserKey};

const CONSTRAINTS: [&str; 3] = [
    "CREATE CONSTRAINT user_mobile IF NOT EXISTS FOR (u:User) REQUIRE u.mobile IS UNIQUE",
    "CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE",
    "CREATE CONSTRAINT purchase_id IF NOT EXISTS FOR (p:Purchase) REQUIRE p.id IS UNIQUE",
];

pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect to the configured instance and ensure uniqueness
    /// constraints exist.
    pub async fn connect(config: &config::Neo4j) -> Result<Self> {
        let mut builder = neo4rs::ConfigBuilder::default()
            .uri(config.address.as_str())
            .user(
                config
                    .username
                    .as_deref()
                    .unwrap_or(crate::config::DEFAULT_NEO4J_USERNAME),
            )
            .password(config.password.as_deref().unwrap_or_default());
        if let Some(database) = &config.database {
            builder = builder.db(database.as_str());
        }

        let graph = Graph::connect(builder.build()?).await?;
        tracing::info!(address = %config.address, "neo4j connected");

        let store = Self { graph };
        store.ensure_schema().await;
        Ok(store)
    }

    async fn ensure_schema(&self) {
        for constraint in CONSTRAINTS {
            if let Err(err) = self.graph.run(query(constraint)).await {
                tracing::warn!(error = %err, "constraint creation skipped");
            }
        }
    }

    async fn fetch_one(&self, q: Query) -> Result<Option<User>> {
        let mut rows = self.graph.execute(q).await?;
        match rows.next().await? {
            Some(row) => {
                let node: Node = row.get("u")?;
                Ok(Some(user_from_node(&node)?))
            },
            None => Ok(None),
        }
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn merge_user(&self, user: &NewUser) -> Result<(User, bool)> {
        let set = creation_set(user);
        let cypher = merge_statement(&set, user.refered_by_name.is_some());

        let mut q = bind_set(
            query(&cypher)
                .param("mobile", user.mobile.as_str())
                .param("id", user.id.as_str())
                .param("created_at", user.created_at.as_str())
                .param("referrer_mobile", user.refered_by_mobile.as_str())
                .param("referrer_id", Uuid::new_v4().to_string()),
            &set,
        );
        if let Some(name) = &user.refered_by_name {
            q = q.param("referrer_name", name.as_str());
        }

        let mut rows = match self.graph.execute(q).await {
            Ok(rows) => rows,
            // only reachable when the MERGE is raced without the unique
            // constraint taking effect first.
            Err(err)
                if err.to_string().contains("ConstraintValidationFailed") =>
            {
                return Err(ServerError::DuplicateUser(user.mobile.clone()));
            },
            Err(err) => return Err(err.into()),
        };

        let row = rows.next().await?.ok_or_else(|| ServerError::Internal {
            details: "MERGE returned no row".into(),
        })?;
        let node: Node = row.get("u")?;
        let stored = user_from_node(&node)?;
        let created = stored.id == user.id;

        Ok((stored, created))
    }

    async fn find_user(&self, key: &UserKey) -> Result<Option<User>> {
        let cypher =
            format!("MATCH (u:User {{{}: $key}}) RETURN u", key.field());
        self.fetch_one(query(&cypher).param("key", key.value())).await
    }

    async fn apply_update(
        &self,
        key: &UserKey,
        set: &UpdateSet,
    ) -> Result<Option<User>> {
        if set.is_empty() {
            return self.find_user(key).await;
        }

        let clause = set_fragment("u", set);
        let cypher = format!(
            "MATCH (u:User {{{}: $key}}) SET {clause} RETURN u",
            key.field()
        );
        self.fetch_one(bind_set(
            query(&cypher).param("key", key.value()),
            set,
        ))
        .await
    }

    async fn mark_verified(
        &self,
        mobile: &str,
        device: &Device,
    ) -> Result<Option<User>> {
        let q = query(
            "MATCH (u:User {mobile: $mobile}) \
             SET u.verified = true, u.device_id = $device_id, \
             u.device_model = $device_model \
             RETURN u",
        )
        .param("mobile", mobile)
        .param("device_id", device.id.as_str())
        .param("device_model", device.model.as_str());

        self.fetch_one(q).await
    }

    async fn list_users(&self, verified: bool) -> Result<Vec<User>> {
        // absent `verified` counts as unverified.
        let q = query(
            "MATCH (u:User) \
             WHERE coalesce(u.verified, false) = $verified \
             RETURN u",
        )
        .param("verified", verified);

        let mut rows = self.graph.execute(q).await?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            let node: Node = row.get("u")?;
            users.push(user_from_node(&node)?);
        }
        Ok(users)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let q = query("MATCH (p:PRODUCT:BUFFALO) RETURN p");

        let mut rows = self.graph.execute(q).await?;
        let mut products = Vec::new();
        while let Some(row) = rows.next().await? {
            let node: Node = row.get("p")?;
            products.push(product_from_node(&node)?);
        }
        Ok(products)
    }

    async fn find_product(&self, product_id: &str) -> Result<Option<Product>> {
        let q = query("MATCH (p:PRODUCT:BUFFALO {id: $id}) RETURN p")
            .param("id", product_id);

        let mut rows = self.graph.execute(q).await?;
        match rows.next().await? {
            Some(row) => {
                let node: Node = row.get("p")?;
                Ok(Some(product_from_node(&node)?))
            },
            None => Ok(None),
        }
    }

    async fn record_purchase(
        &self,
        mobile: &str,
        purchase: &NewPurchase,
    ) -> Result<bool> {
        let price_fragment = if purchase.price.is_some() {
            "price: $price, "
        } else {
            ""
        };
        let cypher = format!(
            "MATCH (u:User {{mobile: $mobile}}) \
             CREATE (u)-[:PURCHASED {{item: $item, details: $details, \
             {price_fragment}purchased_at: $purchased_at}}]\
             ->(p:Purchase {{id: $id}}) \
             RETURN p.id AS id"
        );

        let mut q = query(&cypher)
            .param("mobile", mobile)
            .param("item", purchase.item.as_str())
            .param("details", purchase.details.as_str())
            .param("purchased_at", purchase.purchased_at.as_str())
            .param("id", Uuid::new_v4().to_string());
        if let Some(price) = purchase.price {
            q = q.param("price", price);
        }

        let mut rows = self.graph.execute(q).await?;
        Ok(rows.next().await?.is_some())
    }
}

/// Single create-or-fetch statement. User creation, the placeholder
/// referrer MERGE and the `REFERRED_BY` edge all commit together, so a
/// user can never exist without its referral edge. The `FOREACH` list is
/// empty when the mobile already existed, which keeps replays from ever
/// touching the referrer.
fn merge_statement(set: &UpdateSet, with_referrer_name: bool) -> String {
    let clause = set_fragment("u", set);
    let referrer_name = if with_referrer_name {
        ", r.first_name = $referrer_name"
    } else {
        ""
    };

    format!(
        "MERGE (u:User {{mobile: $mobile}}) \
         ON CREATE SET u.id = $id, u.created_at = $created_at, \
         u.verified = false, {clause} \
         WITH u, CASE WHEN u.id = $id THEN [1] ELSE [] END AS fresh \
         FOREACH (_ IN fresh | \
         MERGE (r:User {{mobile: $referrer_mobile}}) \
         ON CREATE SET r.id = $referrer_id, r.verified = false, \
         r.created_at = $created_at{referrer_name} \
         MERGE (u)-[:REFERRED_BY]->(r)) \
         RETURN u"
    )
}

/// All creation-time properties of a [`NewUser`] as an update set, so the
/// MERGE reuses the same parameter binding as partial updates.
fn creation_set(user: &NewUser) -> UpdateSet {
    let mut set = UpdateSet::default();
    set.push("first_name", user.first_name.as_str().into());
    set.push("last_name", user.last_name.as_str().into());
    set.push("refered_by_mobile", user.refered_by_mobile.as_str().into());
    if let Some(name) = &user.refered_by_name {
        set.push("refered_by_name", name.as_str().into());
    }
    set.push_opt("email", &user.email);
    set.push_opt("dob", &user.dob);
    set.push_opt("address", &user.address);
    set.push_opt("city", &user.city);
    set.push_opt("state", &user.state);
    set.push_opt("aadhar_number", &user.aadhar_number);
    for (key, value) in &user.custom_fields {
        set.push(key, value.clone());
    }
    set
}

/// Render `alias.field = $f_field` assignments. Field names come from the
/// update builder, which only emits vetted identifiers; values stay bound.
/// `null` is inlined as a literal since it removes the property.
fn set_fragment(alias: &str, set: &UpdateSet) -> String {
    set.entries()
        .iter()
        .map(|(field, value)| {
            if value.is_null() {
                format!("{alias}.{field} = null")
            } else {
                format!("{alias}.{field} = $f_{field}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_set(mut q: Query, set: &UpdateSet) -> Query {
    for (field, value) in set.entries() {
        let name = format!("f_{field}");
        q = match value {
            Scalar::Null => q,
            Scalar::Bool(value) => q.param(&name, *value),
            Scalar::Int(value) => q.param(&name, *value),
            Scalar::Float(value) => q.param(&name, *value),
            Scalar::Str(value) => q.param(&name, value.as_str()),
        };
    }
    q
}

fn user_from_node(node: &Node) -> Result<User> {
    let mut custom_fields = BTreeMap::new();
    for key in node.keys() {
        if SCHEMA_FIELDS.contains(&key) {
            continue;
        }
        if let Ok(value) = node.get::<Scalar>(key) {
            custom_fields.insert(key.to_owned(), value);
        }
    }

    Ok(User {
        id: node.get("id")?,
        mobile: node.get("mobile")?,
        first_name: node.get("first_name").unwrap_or_default(),
        last_name: node.get("last_name").unwrap_or_default(),
        email: node.get("email").ok(),
        verified: node.get("verified").unwrap_or(false),
        dob: node.get("dob").ok(),
        address: node.get("address").ok(),
        city: node.get("city").ok(),
        state: node.get("state").ok(),
        aadhar_number: node.get("aadhar_number").ok(),
        refered_by_mobile: node.get("refered_by_mobile").ok(),
        refered_by_name: node.get("refered_by_name").ok(),
        device_id: node.get("device_id").ok(),
        device_model: node.get("device_model").ok(),
        custom_fields,
        created_at: node.get("created_at").unwrap_or_default(),
    })
}

fn product_from_node(node: &Node) -> Result<Product> {
    Ok(Product {
        id: node.get("id")?,
        breed: node.get("breed").ok(),
        age: node.get("age").ok(),
        milk_yield: get_f64(node, "milkYield"),
        price: get_f64(node, "price"),
        in_stock: node.get("inStock").ok(),
        insurance: node.get("insurance").ok(),
        buffalo_images: node.get("buffalo_images").unwrap_or_default(),
    })
}

/// Numeric properties seeded by hand may be stored as integers.
fn get_f64(node: &Node, key: &str) -> Option<f64> {
    node.get::<f64>(key)
        .ok()
        .or_else(|| node.get::<i64>(key).ok().map(|value| value as f64))
}
