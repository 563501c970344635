//! Authorization helpers shared by the route handlers.

use axum::http::StatusCode;

use bankd_auth::{Capability, Principal};

use crate::app::errors;

/// Require one capability of the caller's role.
pub fn require(
    principal: &Principal,
    capability: Capability,
) -> Result<(), axum::response::Response> {
    if principal.role().allows(capability) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("role {} may not do this", principal.role()),
        ))
    }
}

/// Money movements: the capability plus ownership of the named account.
pub fn require_own_funds(
    principal: &Principal,
    username: &str,
) -> Result<(), axum::response::Response> {
    require(principal, Capability::MoveOwnFunds)?;
    if principal.is_self(username) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "funds can only be moved on the caller's own account",
        ))
    }
}

/// Reads of a user or account: the caller's own, or any with the capability.
pub fn require_self_or(
    principal: &Principal,
    username: &str,
    capability: Capability,
) -> Result<(), axum::response::Response> {
    if principal.is_self(username) {
        return Ok(());
    }
    require(principal, capability)
}
