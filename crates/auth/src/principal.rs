//! Authenticated request context.

use bankd_core::UserId;

use crate::Role;

/// The authenticated caller of a request.
///
/// Inserted into request extensions by the auth middleware; immutable for
/// the lifetime of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: UserId,
    username: String,
    role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            username: username.into(),
            role,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// True when `username` names the caller's own account.
    pub fn is_self(&self, username: &str) -> bool {
        self.username == username
    }
}
