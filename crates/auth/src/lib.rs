//! `bankd-auth` — identity, roles, and credential verification.
//!
//! Roles are a closed enumeration with an explicit capability check; no
//! string comparisons at call sites.

pub mod credentials;
pub mod principal;
pub mod roles;
pub mod user;

pub use credentials::{digest_password, verify_password, Credential};
pub use principal::Principal;
pub use roles::{Capability, Role};
pub use user::User;
