//! `bankd-core` — foundation building blocks shared by every layer.
//!
//! This crate contains **pure** primitives (identifiers and the error
//! taxonomy); no infrastructure concerns.

pub mod error;
pub mod id;

pub use error::{BankError, BankResult};
pub use id::{AccountId, EntryId, UserId};
