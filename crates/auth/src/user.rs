//! User identity record.

use serde::{Deserialize, Serialize};

use bankd_core::UserId;

use crate::Role;

/// A user known to the service. Referenced by the ledger only through its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub fullname: String,
    pub role: Role,
}

impl User {
    pub fn new(username: impl Into<String>, fullname: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            fullname: fullname.into(),
            role,
        }
    }
}
