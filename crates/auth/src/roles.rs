//! Role-based access control.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use bankd_core::BankError;

/// Closed set of roles known to the service.
///
/// Stored in the users table as the lowercase string form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Customer,
}

/// Things a caller may be allowed to do.
///
/// Route handlers check one capability each; the role→capability mapping
/// lives in exactly one place (`Role::allows`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create users and change roles.
    ManageUsers,
    /// Deposit to / withdraw from the caller's own account.
    MoveOwnFunds,
    /// Read any user's account, not just the caller's own.
    ViewAnyAccount,
    /// Change an account's interest rate.
    SetInterestRate,
    /// Trigger an on-demand interest payout batch.
    TriggerPayout,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }

    /// Capability check for this role.
    pub fn allows(&self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::SuperAdmin, _) => true,
            (Role::Admin, Capability::ManageUsers) => false,
            (Role::Admin, _) => true,
            (Role::Customer, Capability::MoveOwnFunds) => true,
            (Role::Customer, _) => false,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(BankError::unprocessable(format!("unknown role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_holds_every_capability() {
        for cap in [
            Capability::ManageUsers,
            Capability::MoveOwnFunds,
            Capability::ViewAnyAccount,
            Capability::SetInterestRate,
            Capability::TriggerPayout,
        ] {
            assert!(Role::SuperAdmin.allows(cap));
        }
    }

    #[test]
    fn customer_can_only_move_own_funds() {
        assert!(Role::Customer.allows(Capability::MoveOwnFunds));
        assert!(!Role::Customer.allows(Capability::ManageUsers));
        assert!(!Role::Customer.allows(Capability::ViewAnyAccount));
        assert!(!Role::Customer.allows(Capability::SetInterestRate));
        assert!(!Role::Customer.allows(Capability::TriggerPayout));
    }

    #[test]
    fn admin_cannot_manage_users() {
        assert!(!Role::Admin.allows(Capability::ManageUsers));
        assert!(Role::Admin.allows(Capability::SetInterestRate));
    }

    #[test]
    fn roles_round_trip_through_str() {
        for role in [Role::SuperAdmin, Role::Admin, Role::Customer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }
}
