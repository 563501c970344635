//! Transaction-log entries.
//!
//! Every money-movement attempt gets an intent entry before the balance is
//! touched. The entry is immutable except for its status, which moves
//! `IN_PROGRESS → {COMPLETED, FAILED}` exactly once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bankd_core::{BankError, BankResult, EntryId};

/// Side of the ledger the amount moves on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    /// Single-letter code stored in the transactions table.
    pub fn db_code(&self) -> &'static str {
        match self {
            EntryType::Debit => "D",
            EntryType::Credit => "C",
        }
    }

    pub fn from_db_code(code: &str) -> BankResult<Self> {
        match code {
            "D" => Ok(EntryType::Debit),
            "C" => Ok(EntryType::Credit),
            other => Err(BankError::store(format!("unknown entry type code: {other}"))),
        }
    }
}

/// Business action the entry records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryAction {
    Withdrawal,
    Deposit,
    Transfer,
    Purchase,
    Interest,
}

impl EntryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryAction::Withdrawal => "WITHDRAWAL",
            EntryAction::Deposit => "DEPOSIT",
            EntryAction::Transfer => "TRANSFER",
            EntryAction::Purchase => "PURCHASE",
            EntryAction::Interest => "INTEREST",
        }
    }

    pub fn from_str_db(s: &str) -> BankResult<Self> {
        match s {
            "WITHDRAWAL" => Ok(EntryAction::Withdrawal),
            "DEPOSIT" => Ok(EntryAction::Deposit),
            "TRANSFER" => Ok(EntryAction::Transfer),
            "PURCHASE" => Ok(EntryAction::Purchase),
            "INTEREST" => Ok(EntryAction::Interest),
            other => Err(BankError::store(format!("unknown entry action: {other}"))),
        }
    }
}

/// Entry lifecycle status. `Completed` and `Failed` are terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    InProgress,
    Completed,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::InProgress => "IN_PROGRESS",
            EntryStatus::Completed => "COMPLETED",
            EntryStatus::Failed => "FAILED",
        }
    }

    pub fn from_str_db(s: &str) -> BankResult<Self> {
        match s {
            "IN_PROGRESS" => Ok(EntryStatus::InProgress),
            "COMPLETED" => Ok(EntryStatus::Completed),
            "FAILED" => Ok(EntryStatus::Failed),
            other => Err(BankError::store(format!("unknown entry status: {other}"))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Failed)
    }

    /// Whether the state machine permits `self → next`.
    pub fn can_transition_to(&self, next: EntryStatus) -> bool {
        matches!(self, EntryStatus::InProgress) && next.is_terminal()
    }
}

/// One money-movement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub entry_type: EntryType,
    /// Positive, fixed-point.
    pub amount: Decimal,
    pub action: EntryAction,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(entry_type: EntryType, amount: Decimal, action: EntryAction) -> Self {
        let now = Utc::now();
        Self {
            id: EntryId::new(),
            entry_type,
            amount,
            action,
            status: EntryStatus::InProgress,
            created_at: now,
            updated_at: now,
        }
    }

    /// Intent record for money leaving an account.
    pub fn debit(amount: Decimal, action: EntryAction) -> Self {
        Self::new(EntryType::Debit, amount, action)
    }

    /// Intent record for money entering an account.
    pub fn credit(amount: Decimal, action: EntryAction) -> Self {
        Self::new(EntryType::Credit, amount, action)
    }

    /// Move the entry to a terminal status.
    ///
    /// Rejects any transition out of a terminal status.
    pub fn finalize(&mut self, status: EntryStatus) -> BankResult<()> {
        if !self.status.can_transition_to(status) {
            return Err(BankError::conflict(format!(
                "entry {} is {}, cannot become {}",
                self.id,
                self.status.as_str(),
                status.as_str()
            )));
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
