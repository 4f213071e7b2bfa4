//! Account definitions for the wallet ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use walletcore_common::{AccountId, Currency, Money};

/// Account status. Accounts are never hard-deleted; closing is a soft
/// lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    /// Account is active and can transact.
    Active,
    /// Account is frozen (no transactions allowed).
    Frozen,
    /// Account is closed.
    Closed,
}

/// A wallet account holding the owner's current balance.
///
/// The balance is mutated only through `LedgerEngine` and
/// `SettlementTracker` operations, which hold the account's exclusive lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: AccountId,
    /// Owner's email (directory lookup key, not the settlement key).
    pub email: String,
    /// Owner's display name.
    pub name: String,
    /// Account currency.
    pub currency: Currency,
    /// Current balance. Invariant: never negative.
    pub balance: Decimal,
    /// Account status.
    pub status: AccountStatus,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance.
    pub fn new(email: impl Into<String>, name: impl Into<String>, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            email: email.into(),
            name: name.into(),
            currency,
            balance: Decimal::ZERO,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current balance as money.
    pub fn balance_money(&self) -> Money {
        Money::new(self.balance, self.currency.clone())
    }

    /// Check if account can transact.
    pub fn can_transact(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Freeze the account.
    pub fn freeze(&mut self) {
        self.status = AccountStatus::Frozen;
        self.updated_at = Utc::now();
    }

    /// Unfreeze the account.
    pub fn unfreeze(&mut self) {
        self.status = AccountStatus::Active;
        self.updated_at = Utc::now();
    }

    /// Close the account.
    pub fn close(&mut self) {
        self.status = AccountStatus::Closed;
        self.updated_at = Utc::now();
    }
}
