//! User Aggregate

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acting user. `premium_status` caches whether an active subscription exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub premium_status: bool,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), name: name.into(), email: email.into(), premium_status: false }
    }
}
