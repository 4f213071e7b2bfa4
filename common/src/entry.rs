//! Ledger entry model and status state machine.

use crate::{AccountId, EntryId, Money, Reference, TransferGroupId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Direction of a fund movement against an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Increases the account balance.
    Credit,
    /// Decreases the account balance.
    Debit,
}

/// Category of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Internal wallet-to-wallet transfer.
    Transfer,
    /// Withdrawal to an external bank account.
    Withdrawal,
    /// Externally-settled deposit into the wallet.
    Deposit,
    /// Cryptocurrency purchase.
    CryptoBuy,
    /// Airtime top-up purchase.
    Airtime,
    /// Data bundle purchase.
    Data,
}

impl Category {
    /// Check if entries of this category carry a purchase detail record.
    pub fn has_purchase_detail(&self) -> bool {
        matches!(self, Category::CryptoBuy | Category::Airtime | Category::Data)
    }
}

/// Ledger entry status representing the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Entry created, funds not yet moved.
    Pending,
    /// Funds moved and the entry committed.
    Completed,
    /// Entry rejected; recorded for audit, balance unchanged.
    Failed,
    /// Entry cancelled before completion.
    Cancelled,
}

impl EntryStatus {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            EntryStatus::Completed | EntryStatus::Failed | EntryStatus::Cancelled
        )
    }

    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[EntryStatus] {
        match self {
            EntryStatus::Pending => &[
                EntryStatus::Completed,
                EntryStatus::Failed,
                EntryStatus::Cancelled,
            ],
            EntryStatus::Completed => &[],
            EntryStatus::Failed => &[],
            EntryStatus::Cancelled => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: EntryStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// The other side of a fund movement, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counterparty {
    /// Another wallet account.
    Internal(AccountId),
    /// An external bank account.
    Bank {
        account_number: String,
        bank_code: String,
        account_name: Option<String>,
    },
    /// A named external party (biller, exchange).
    External(String),
}

/// Category-specific purchase detail, lifetime-bound to its ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseDetail {
    Crypto {
        /// Asset symbol (BTC, ETH, USDT, ...).
        asset: String,
        /// Quantity of the asset purchased.
        amount_crypto: Decimal,
        /// Wallet-currency price per unit at purchase time.
        exchange_rate: Decimal,
        wallet_address: Option<String>,
        network: Option<String>,
    },
    Airtime {
        phone_number: String,
        network: String,
        plan_name: Option<String>,
    },
    Data {
        phone_number: String,
        network: String,
        data_plan: String,
        validity: Option<String>,
    },
}

impl PurchaseDetail {
    /// The entry category this detail belongs to.
    pub fn category(&self) -> Category {
        match self {
            PurchaseDetail::Crypto { .. } => Category::CryptoBuy,
            PurchaseDetail::Airtime { .. } => Category::Airtime,
            PurchaseDetail::Data { .. } => Category::Data,
        }
    }
}

/// An immutable record of one directional fund movement against an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID.
    pub id: EntryId,
    /// Account affected.
    pub account_id: AccountId,
    /// Entry direction (credit or debit).
    pub direction: Direction,
    /// Entry category.
    pub category: Category,
    /// Amount (always positive; direction carries the sign).
    pub amount: Money,
    /// Current status.
    pub status: EntryStatus,
    /// Globally unique reference.
    pub reference: Reference,
    /// Group shared by the two legs of an internal transfer.
    pub transfer_group: Option<TransferGroupId>,
    /// The other side of the movement, when known.
    pub counterparty: Option<Counterparty>,
    /// Category-specific purchase detail.
    pub detail: Option<PurchaseDetail>,
    /// Human-readable description.
    pub description: String,
    /// Open extension map.
    pub metadata: HashMap<String, String>,
    /// Account balance after this entry committed.
    pub balance_after: Decimal,
    /// When this entry was created.
    pub created_at: DateTime<Utc>,
    /// When this entry reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Create a new pending entry.
    pub fn new(
        account_id: AccountId,
        direction: Direction,
        category: Category,
        amount: Money,
        reference: Reference,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            account_id,
            direction,
            category,
            amount,
            status: EntryStatus::Pending,
            reference,
            transfer_group: None,
            counterparty: None,
            detail: None,
            description: description.into(),
            metadata: HashMap::new(),
            balance_after: Decimal::ZERO,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Attach the transfer group.
    pub fn with_transfer_group(mut self, group: TransferGroupId) -> Self {
        self.transfer_group = Some(group);
        self
    }

    /// Attach the counterparty.
    pub fn with_counterparty(mut self, counterparty: Counterparty) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    /// Attach a purchase detail.
    pub fn with_detail(mut self, detail: PurchaseDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Transition to a new status.
    pub fn transition_to(&mut self, new_status: EntryStatus) -> Result<(), InvalidEntryTransition> {
        if !self.status.can_transition_to(new_status) {
            return Err(InvalidEntryTransition {
                from: self.status,
                to: new_status,
            });
        }

        self.status = new_status;
        if new_status.is_final() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark the entry completed, recording the resulting balance.
    pub fn complete(&mut self, balance_after: Decimal) -> Result<(), InvalidEntryTransition> {
        self.transition_to(EntryStatus::Completed)?;
        self.balance_after = balance_after;
        Ok(())
    }

    /// Mark the entry failed, recording the unchanged balance.
    pub fn fail(&mut self, balance_after: Decimal) -> Result<(), InvalidEntryTransition> {
        self.transition_to(EntryStatus::Failed)?;
        self.balance_after = balance_after;
        Ok(())
    }

    /// Get signed amount (positive for credit, negative for debit).
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount.value,
            Direction::Debit => -self.amount.value,
        }
    }
}

/// Error when attempting invalid entry status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidEntryTransition {
    pub from: EntryStatus,
    pub to: EntryStatus,
}

impl std::fmt::Display for InvalidEntryTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid entry transition from {:?} to {:?}",
            self.from, self.to
        )
    }
}

impl std::error::Error for InvalidEntryTransition {}
