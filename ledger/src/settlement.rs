//! Idempotent settlement of externally-triggered deposits.
//!
//! Payment providers deliver webhooks at-least-once, so the same payment
//! event can arrive multiple times. The tracker keys settlements by the
//! provider's external reference and guarantees each event credits the wallet
//! exactly once, no matter how often it is replayed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use walletcore_common::{
    AccountId, Category, Direction, EntryId, ExternalReference, Money, Result, WalletError,
};

use crate::engine::{EntryRequest, LedgerEngine};
use crate::store::LedgerStore;

/// Record that one external payment event has been settled into a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Provider-supplied reference for the payment event.
    pub external_reference: ExternalReference,
    /// Account that was credited.
    pub account_id: AccountId,
    /// Amount credited.
    pub amount: Money,
    /// The deposit entry this settlement produced.
    pub entry_id: EntryId,
    /// When the settlement was applied.
    pub processed_at: DateTime<Utc>,
}

/// Outcome of a settlement attempt.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    /// True when this call moved funds; false for a replayed event.
    pub applied: bool,
    /// The settlement record (newly created or pre-existing).
    pub record: SettlementRecord,
}

/// Applies externally-triggered deposits exactly once per payment event.
#[derive(Clone)]
pub struct SettlementTracker {
    engine: LedgerEngine,
}

impl SettlementTracker {
    /// Create a tracker over a ledger engine.
    pub fn new(engine: LedgerEngine) -> Self {
        Self { engine }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<LedgerStore> {
        self.engine.store()
    }

    /// Credit a wallet for one external payment event, exactly once.
    ///
    /// The settlement record is created atomically with the deposit entry
    /// under the account's lock. A replayed event finds the existing record
    /// and returns it with `applied: false` without touching the balance. If
    /// the credit itself fails, no record is written, so a later retry can
    /// still settle the event.
    #[instrument(skip(self), fields(account = %account_id, reference = %external_reference, amount = %amount))]
    pub fn settle(
        &self,
        account_id: AccountId,
        external_reference: ExternalReference,
        amount: Money,
    ) -> Result<SettlementOutcome> {
        if !external_reference.is_valid() {
            return Err(WalletError::InvalidRequest {
                message: "external reference is empty or too long".to_string(),
                field: Some("external_reference".to_string()),
            });
        }
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(format!(
                "settlement amount must be positive, got {}",
                amount.value
            )));
        }

        let lock = self.engine.store().account_lock(&account_id)?;
        let _guard = lock.lock();

        // The map entry is the idempotency guard: check and insert are one
        // atomic step, and the slot is only filled after the credit commits.
        match self
            .engine
            .store()
            .settlements
            .entry(external_reference.clone())
        {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let record = existing.get().clone();
                info!(
                    entry = %record.entry_id,
                    "Payment event already settled; skipping"
                );
                Ok(SettlementOutcome {
                    applied: false,
                    record,
                })
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let mut metadata = HashMap::new();
                metadata.insert(
                    "external_reference".to_string(),
                    external_reference.to_string(),
                );

                let entry = self.engine.apply_locked(
                    EntryRequest::new(account_id, Direction::Credit, Category::Deposit, amount.clone())
                        .with_description(format!(
                            "Wallet deposit via bank transfer. Ref: {external_reference}"
                        ))
                        .with_metadata(metadata),
                )?;

                let record = SettlementRecord {
                    external_reference,
                    account_id,
                    amount,
                    entry_id: entry.id,
                    processed_at: Utc::now(),
                };
                slot.insert(record.clone());

                info!(entry = %entry.id, "Payment event settled");
                Ok(SettlementOutcome {
                    applied: true,
                    record,
                })
            }
        }
    }
}
