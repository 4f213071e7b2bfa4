//! Core ledger engine implementation.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use walletcore_common::{
    AccountId, Category, Counterparty, Direction, EntryStatus, LedgerEntry, Money, PurchaseDetail,
    Reference, Result, TransferGroupId, WalletError,
};

use crate::store::LedgerStore;

/// Request to apply one directional fund movement.
#[derive(Debug, Clone)]
pub struct EntryRequest {
    /// Account to debit or credit.
    pub account_id: AccountId,
    /// Entry direction.
    pub direction: Direction,
    /// Entry category.
    pub category: Category,
    /// Amount; must be positive.
    pub amount: Money,
    /// Caller-supplied reference; generated when absent.
    pub reference: Option<Reference>,
    /// The other side of the movement, when known.
    pub counterparty: Option<Counterparty>,
    /// Category-specific purchase detail.
    pub detail: Option<PurchaseDetail>,
    /// Human-readable description.
    pub description: String,
    /// Open extension map.
    pub metadata: HashMap<String, String>,
}

impl EntryRequest {
    /// Create a new request.
    pub fn new(
        account_id: AccountId,
        direction: Direction,
        category: Category,
        amount: Money,
    ) -> Self {
        Self {
            account_id,
            direction,
            category,
            amount,
            reference: None,
            counterparty: None,
            detail: None,
            description: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// Set a caller-supplied reference.
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Set the counterparty.
    pub fn with_counterparty(mut self, counterparty: Counterparty) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    /// Set the purchase detail.
    pub fn with_detail(mut self, detail: PurchaseDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the metadata map.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The ledger engine applies debits and credits to account balances and
/// records journal entries, atomically per account.
#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<LedgerStore>,
}

impl LedgerEngine {
    /// Create a new ledger engine over a store.
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Apply a single debit or credit.
    ///
    /// Balance update and entry insertion happen under the account's
    /// exclusive lock; either both become visible or neither does. A debit
    /// that would overdraw the account is journaled with status `Failed` and
    /// surfaced as `InsufficientFunds`, leaving the balance unchanged. A
    /// request whose reference has already been used returns the existing
    /// entry instead of applying anything.
    #[instrument(skip(self, request), fields(account = %request.account_id, amount = %request.amount))]
    pub fn apply_entry(&self, request: EntryRequest) -> Result<LedgerEntry> {
        Self::validate(&request)?;

        let lock = self.store.account_lock(&request.account_id)?;
        let _guard = lock.lock();
        self.apply_locked(request)
    }

    /// Move funds between two wallet accounts in one atomic unit.
    ///
    /// Produces two correlated entries sharing a transfer group: a debit on
    /// the sender and a credit on the recipient. Locks are acquired in
    /// ascending account-id order so that concurrent opposing transfers
    /// cannot deadlock. If the sender cannot cover the amount, a failed debit
    /// entry is journaled and the recipient is untouched. A retry carrying
    /// the same reference replays the recorded outcome, success or failure;
    /// a fresh attempt needs a fresh reference.
    #[instrument(skip(self, description, reference), fields(from = %from, to = %to, amount = %amount))]
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Money,
        description: impl Into<String>,
        reference: Option<Reference>,
    ) -> Result<(LedgerEntry, LedgerEntry)> {
        if from == to {
            return Err(WalletError::InvalidRequest {
                message: "transfer recipient must differ from sender".to_string(),
                field: Some("recipient".to_string()),
            });
        }
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(format!(
                "transfer amount must be positive, got {}",
                amount.value
            )));
        }

        let sender_lock = self.store.account_lock(&from)?;
        let recipient_lock = self
            .store
            .account_lock(&to)
            .map_err(|_| WalletError::RecipientNotFound(to.to_string()))?;

        // Fixed global order: ascending account id.
        let (_guard_a, _guard_b) = if from < to {
            (sender_lock.lock(), recipient_lock.lock())
        } else {
            (recipient_lock.lock(), sender_lock.lock())
        };

        // Retried transfer with a stable reference replays the recorded
        // outcome: the prior pair on success, the prior failure otherwise.
        if let Some(r) = &reference {
            if let Some(existing) = self.store.entry_by_reference(r) {
                if existing.status == EntryStatus::Failed {
                    info!(reference = %r, "Transfer already attempted and failed");
                    return Err(WalletError::InsufficientFunds {
                        required: existing.amount.value.to_string(),
                        available: existing.balance_after.to_string(),
                    });
                }
                if let Some(group) = existing.transfer_group {
                    let sibling = self
                        .store
                        .entries_in_group(&group)
                        .into_iter()
                        .find(|e| e.id != existing.id);
                    if let Some(credit) = sibling {
                        info!(reference = %r, "Transfer already processed");
                        return Ok((existing, credit));
                    }
                }
                return Err(WalletError::DuplicateReference(r.clone()));
            }
        }

        let sender_balance = self.checked_balance(&from, &amount)?;
        let recipient_balance = match self.checked_balance(&to, &amount) {
            Ok(balance) => balance,
            Err(WalletError::AccountNotFound(_)) => {
                return Err(WalletError::RecipientNotFound(to.to_string()))
            }
            Err(e) => return Err(e),
        };

        let description = description.into();
        let group = TransferGroupId::new();
        let debit_reference = reference.unwrap_or_else(Reference::generate);
        let credit_reference = Reference::generate();

        let mut debit = LedgerEntry::new(
            from,
            Direction::Debit,
            Category::Transfer,
            amount.clone(),
            debit_reference.clone(),
            description.clone(),
        )
        .with_transfer_group(group)
        .with_counterparty(Counterparty::Internal(to));

        let mut credit = LedgerEntry::new(
            to,
            Direction::Credit,
            Category::Transfer,
            amount.clone(),
            credit_reference.clone(),
            description,
        )
        .with_transfer_group(group)
        .with_counterparty(Counterparty::Internal(from));

        if sender_balance < amount.value {
            debit.fail(sender_balance)?;
            if self.store.reserve_reference(&debit_reference, debit.id).is_err() {
                return Err(WalletError::DuplicateReference(debit_reference));
            }
            self.store.commit_entry(debit);
            warn!(
                from = %from,
                required = %amount.value,
                available = %sender_balance,
                "Transfer rejected: insufficient funds"
            );
            return Err(WalletError::InsufficientFunds {
                required: amount.value.to_string(),
                available: sender_balance.to_string(),
            });
        }

        // Reserve both references before mutating anything.
        if self.store.reserve_reference(&debit_reference, debit.id).is_err() {
            return Err(WalletError::DuplicateReference(debit_reference));
        }
        if self.store.reserve_reference(&credit_reference, credit.id).is_err() {
            self.store.by_reference.remove(&debit_reference);
            return Err(WalletError::DuplicateReference(credit_reference));
        }

        let new_sender_balance = sender_balance - amount.value;
        let new_recipient_balance = recipient_balance + amount.value;

        self.store.set_balance(&from, new_sender_balance)?;
        self.store.set_balance(&to, new_recipient_balance)?;
        debit.complete(new_sender_balance)?;
        credit.complete(new_recipient_balance)?;
        self.store.commit_entry(debit.clone());
        self.store.commit_entry(credit.clone());

        info!(
            group = %group,
            debit_entry = %debit.id,
            credit_entry = %credit.id,
            "Transfer completed"
        );

        Ok((debit, credit))
    }

    /// Get an account's current balance.
    pub fn balance(&self, account_id: &AccountId) -> Result<Money> {
        self.store
            .account(account_id)
            .map(|a| a.balance_money())
            .ok_or(WalletError::AccountNotFound(*account_id))
    }

    /// Verify the account invariant: the balance equals the sum of completed
    /// credits minus completed debits.
    pub fn reconcile(&self, account_id: &AccountId) -> Result<bool> {
        let lock = self.store.account_lock(account_id)?;
        let _guard = lock.lock();

        let account = self
            .store
            .account(account_id)
            .ok_or(WalletError::AccountNotFound(*account_id))?;

        let net: Decimal = self
            .store
            .entries_for_account(account_id)
            .iter()
            .filter(|e| e.status == EntryStatus::Completed)
            .map(|e| e.signed_amount())
            .sum();

        Ok(net == account.balance)
    }

    /// Apply an entry while the caller holds the account lock.
    pub(crate) fn apply_locked(&self, request: EntryRequest) -> Result<LedgerEntry> {
        let reference = request
            .reference
            .clone()
            .unwrap_or_else(Reference::generate);

        // A reused reference replays the recorded entry before any account
        // checks run, so a retry stays idempotent even if the account has
        // since been frozen or closed.
        if let Some(existing) = self.store.entry_by_reference(&reference) {
            info!(reference = %reference, "Reference already processed; returning existing entry");
            return Ok(existing);
        }

        let balance = self.checked_balance(&request.account_id, &request.amount)?;

        let mut entry = LedgerEntry::new(
            request.account_id,
            request.direction,
            request.category,
            request.amount.clone(),
            reference.clone(),
            request.description.clone(),
        )
        .with_metadata(request.metadata.clone());
        if let Some(counterparty) = request.counterparty.clone() {
            entry = entry.with_counterparty(counterparty);
        }
        if let Some(detail) = request.detail.clone() {
            entry = entry.with_detail(detail);
        }

        // Lost a cross-account race on the same reference; the winner's
        // entry may not be committed yet, hence the fallback.
        if let Err(existing_id) = self.store.reserve_reference(&reference, entry.id) {
            return self
                .store
                .entry(&existing_id)
                .ok_or(WalletError::DuplicateReference(reference));
        }

        match request.direction {
            Direction::Debit if balance < request.amount.value => {
                entry.fail(balance)?;
                self.store.commit_entry(entry);
                warn!(
                    account = %request.account_id,
                    required = %request.amount.value,
                    available = %balance,
                    "Debit rejected: insufficient funds"
                );
                Err(WalletError::InsufficientFunds {
                    required: request.amount.value.to_string(),
                    available: balance.to_string(),
                })
            }
            Direction::Debit => {
                let new_balance = balance - request.amount.value;
                self.store.set_balance(&request.account_id, new_balance)?;
                entry.complete(new_balance)?;
                self.store.commit_entry(entry.clone());
                info!(
                    entry = %entry.id,
                    balance_after = %new_balance,
                    "Debit applied"
                );
                Ok(entry)
            }
            Direction::Credit => {
                let new_balance = balance + request.amount.value;
                self.store.set_balance(&request.account_id, new_balance)?;
                entry.complete(new_balance)?;
                self.store.commit_entry(entry.clone());
                info!(
                    entry = %entry.id,
                    balance_after = %new_balance,
                    "Credit applied"
                );
                Ok(entry)
            }
        }
    }

    /// Validate request shape before touching the store.
    fn validate(request: &EntryRequest) -> Result<()> {
        if !request.amount.is_positive() {
            return Err(WalletError::InvalidAmount(format!(
                "entry amount must be positive, got {}",
                request.amount.value
            )));
        }
        if let Some(reference) = &request.reference {
            if !reference.is_valid() {
                return Err(WalletError::InvalidRequest {
                    message: "reference is empty or too long".to_string(),
                    field: Some("reference".to_string()),
                });
            }
        }
        if let Some(detail) = &request.detail {
            if detail.category() != request.category {
                return Err(WalletError::InvalidRequest {
                    message: "purchase detail does not match entry category".to_string(),
                    field: Some("detail".to_string()),
                });
            }
        }
        Ok(())
    }

    /// Fetch the balance after the account and currency checks that precede
    /// every mutation.
    fn checked_balance(&self, account_id: &AccountId, amount: &Money) -> Result<Decimal> {
        let account = self
            .store
            .accounts
            .get(account_id)
            .ok_or(WalletError::AccountNotFound(*account_id))?;
        if !account.can_transact() {
            return Err(WalletError::AccountFrozen(*account_id));
        }
        if amount.currency != account.currency {
            return Err(WalletError::CurrencyMismatch {
                expected: account.currency.code().to_string(),
                actual: amount.currency.code().to_string(),
            });
        }
        Ok(account.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use walletcore_common::Currency;

    fn engine_with_account(balance: Decimal) -> (LedgerEngine, AccountId) {
        let store = Arc::new(LedgerStore::new());
        let engine = LedgerEngine::new(store.clone());
        let account = store.open_account("ada@example.com", "Ada", Currency::ngn());
        if balance > Decimal::ZERO {
            engine
                .apply_entry(
                    EntryRequest::new(
                        account.id,
                        Direction::Credit,
                        Category::Deposit,
                        Money::new(balance, Currency::ngn()),
                    )
                    .with_description("Opening deposit"),
                )
                .unwrap();
        }
        (engine, account.id)
    }

    fn ngn(value: Decimal) -> Money {
        Money::new(value, Currency::ngn())
    }

    #[test]
    fn test_credit_then_debit() {
        let (engine, account) = engine_with_account(dec!(0));

        engine
            .apply_entry(EntryRequest::new(
                account,
                Direction::Credit,
                Category::Deposit,
                ngn(dec!(1000.00)),
            ))
            .unwrap();

        let debit = engine
            .apply_entry(EntryRequest::new(
                account,
                Direction::Debit,
                Category::Withdrawal,
                ngn(dec!(250.00)),
            ))
            .unwrap();

        assert_eq!(debit.status, EntryStatus::Completed);
        assert_eq!(debit.balance_after, dec!(750.00));
        assert_eq!(engine.balance(&account).unwrap().value, dec!(750.00));
        assert!(engine.reconcile(&account).unwrap());
    }

    #[test]
    fn test_invalid_amount_rejected() {
        let (engine, account) = engine_with_account(dec!(100));

        let err = engine
            .apply_entry(EntryRequest::new(
                account,
                Direction::Debit,
                Category::Withdrawal,
                ngn(dec!(0)),
            ))
            .unwrap_err();

        assert!(matches!(err, WalletError::InvalidAmount(_)));
        // nothing journaled
        assert_eq!(engine.store().entries_for_account(&account).len(), 1);
    }

    #[test]
    fn test_overdraw_records_failed_entry() {
        let (engine, account) = engine_with_account(dec!(800.00));

        let err = engine
            .apply_entry(EntryRequest::new(
                account,
                Direction::Debit,
                Category::Withdrawal,
                ngn(dec!(9999.00)),
            ))
            .unwrap_err();

        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        assert_eq!(engine.balance(&account).unwrap().value, dec!(800.00));

        let entries = engine.store().entries_for_account(&account);
        let failed = entries
            .iter()
            .find(|e| e.status == EntryStatus::Failed)
            .expect("failed entry journaled for audit");
        assert_eq!(failed.amount.value, dec!(9999.00));
        assert!(engine.reconcile(&account).unwrap());
    }

    #[test]
    fn test_duplicate_reference_returns_existing_entry() {
        let (engine, account) = engine_with_account(dec!(1000.00));
        let reference = Reference::new("TXAAAABBBBCCCC");

        let first = engine
            .apply_entry(
                EntryRequest::new(
                    account,
                    Direction::Debit,
                    Category::Withdrawal,
                    ngn(dec!(100.00)),
                )
                .with_reference(reference.clone()),
            )
            .unwrap();

        let second = engine
            .apply_entry(
                EntryRequest::new(
                    account,
                    Direction::Debit,
                    Category::Withdrawal,
                    ngn(dec!(100.00)),
                )
                .with_reference(reference),
            )
            .unwrap();

        assert_eq!(first.id, second.id);
        // only debited once
        assert_eq!(engine.balance(&account).unwrap().value, dec!(900.00));
    }

    #[test]
    fn test_frozen_account_refuses_entries() {
        let (engine, account) = engine_with_account(dec!(500.00));
        engine.store().freeze_account(&account).unwrap();

        let err = engine
            .apply_entry(EntryRequest::new(
                account,
                Direction::Credit,
                Category::Deposit,
                ngn(dec!(10.00)),
            ))
            .unwrap_err();

        assert!(matches!(err, WalletError::AccountFrozen(_)));
    }

    #[test]
    fn test_currency_mismatch_rejected() {
        let (engine, account) = engine_with_account(dec!(500.00));

        let err = engine
            .apply_entry(EntryRequest::new(
                account,
                Direction::Credit,
                Category::Deposit,
                Money::new(dec!(10.00), Currency::usd()),
            ))
            .unwrap_err();

        assert!(matches!(err, WalletError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_transfer_moves_funds_atomically() {
        let store = Arc::new(LedgerStore::new());
        let engine = LedgerEngine::new(store.clone());
        let a = store.open_account("a@example.com", "A", Currency::ngn());
        let b = store.open_account("b@example.com", "B", Currency::ngn());
        engine
            .apply_entry(EntryRequest::new(
                a.id,
                Direction::Credit,
                Category::Deposit,
                ngn(dec!(1000.00)),
            ))
            .unwrap();

        let (debit, credit) = engine
            .transfer(a.id, b.id, ngn(dec!(200.00)), "Lunch money", None)
            .unwrap();

        assert_eq!(engine.balance(&a.id).unwrap().value, dec!(800.00));
        assert_eq!(engine.balance(&b.id).unwrap().value, dec!(200.00));
        assert_eq!(debit.status, EntryStatus::Completed);
        assert_eq!(credit.status, EntryStatus::Completed);
        assert_eq!(debit.transfer_group, credit.transfer_group);
        assert!(debit.transfer_group.is_some());
        assert!(engine.reconcile(&a.id).unwrap());
        assert!(engine.reconcile(&b.id).unwrap());
    }

    #[test]
    fn test_transfer_to_missing_recipient_rolls_back() {
        let (engine, account) = engine_with_account(dec!(1000.00));
        let entries_before = engine.store().entries_for_account(&account).len();

        let err = engine
            .transfer(
                account,
                AccountId::new(),
                ngn(dec!(200.00)),
                "To nowhere",
                None,
            )
            .unwrap_err();

        assert!(matches!(err, WalletError::RecipientNotFound(_)));
        assert_eq!(engine.balance(&account).unwrap().value, dec!(1000.00));
        assert_eq!(
            engine.store().entries_for_account(&account).len(),
            entries_before
        );
    }

    #[test]
    fn test_transfer_insufficient_funds_leaves_recipient_untouched() {
        let store = Arc::new(LedgerStore::new());
        let engine = LedgerEngine::new(store.clone());
        let a = store.open_account("a@example.com", "A", Currency::ngn());
        let b = store.open_account("b@example.com", "B", Currency::ngn());

        let err = engine
            .transfer(a.id, b.id, ngn(dec!(50.00)), "Broke", None)
            .unwrap_err();

        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        assert_eq!(engine.balance(&b.id).unwrap().value, dec!(0));
        let failed = engine
            .store()
            .entries_for_account(&a.id)
            .into_iter()
            .find(|e| e.status == EntryStatus::Failed);
        assert!(failed.is_some());
    }

    #[test]
    fn test_transfer_to_self_rejected() {
        let (engine, account) = engine_with_account(dec!(1000.00));
        let err = engine
            .transfer(account, account, ngn(dec!(10.00)), "Self", None)
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidRequest { .. }));
    }

    #[test]
    fn test_transfer_retry_with_stable_reference() {
        let store = Arc::new(LedgerStore::new());
        let engine = LedgerEngine::new(store.clone());
        let a = store.open_account("a@example.com", "A", Currency::ngn());
        let b = store.open_account("b@example.com", "B", Currency::ngn());
        engine
            .apply_entry(EntryRequest::new(
                a.id,
                Direction::Credit,
                Category::Deposit,
                ngn(dec!(1000.00)),
            ))
            .unwrap();

        let reference = Reference::new("TXTRANSFER0001");
        let (debit1, _) = engine
            .transfer(
                a.id,
                b.id,
                ngn(dec!(100.00)),
                "Rent",
                Some(reference.clone()),
            )
            .unwrap();
        let (debit2, credit2) = engine
            .transfer(a.id, b.id, ngn(dec!(100.00)), "Rent", Some(reference))
            .unwrap();

        assert_eq!(debit1.id, debit2.id);
        assert_eq!(debit2.transfer_group, credit2.transfer_group);
        // second call moved nothing
        assert_eq!(engine.balance(&a.id).unwrap().value, dec!(900.00));
        assert_eq!(engine.balance(&b.id).unwrap().value, dec!(100.00));
    }

    #[test]
    fn test_concurrent_debits_never_overdraw() {
        let (engine, account) = engine_with_account(dec!(100.00));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    engine.apply_entry(EntryRequest::new(
                        account,
                        Direction::Debit,
                        Category::Withdrawal,
                        ngn(dec!(30.00)),
                    ))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let overdrawn = results
            .iter()
            .filter(|r| matches!(r, Err(WalletError::InsufficientFunds { .. })))
            .count();

        // exactly enough succeed to keep the balance non-negative
        assert_eq!(succeeded, 3);
        assert_eq!(overdrawn, 1);
        assert_eq!(engine.balance(&account).unwrap().value, dec!(10.00));
        assert!(engine.reconcile(&account).unwrap());
    }

    #[test]
    fn test_opposing_transfers_do_not_deadlock() {
        let store = Arc::new(LedgerStore::new());
        let engine = LedgerEngine::new(store.clone());
        let a = store.open_account("a@example.com", "A", Currency::ngn());
        let b = store.open_account("b@example.com", "B", Currency::ngn());
        for id in [a.id, b.id] {
            engine
                .apply_entry(EntryRequest::new(
                    id,
                    Direction::Credit,
                    Category::Deposit,
                    ngn(dec!(1000.00)),
                ))
                .unwrap();
        }

        let (a, b) = (a.id, b.id);
        let handles: Vec<_> = (0..50)
            .flat_map(|_| {
                let ping = engine.clone();
                let pong = engine.clone();
                [
                    std::thread::spawn(move || ping.transfer(a, b, ngn(dec!(10.00)), "Ping", None)),
                    std::thread::spawn(move || pong.transfer(b, a, ngn(dec!(10.00)), "Pong", None)),
                ]
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        // equal opposing volume nets to zero
        assert_eq!(engine.balance(&a).unwrap().value, dec!(1000.00));
        assert_eq!(engine.balance(&b).unwrap().value, dec!(1000.00));
        assert!(engine.reconcile(&a).unwrap());
        assert!(engine.reconcile(&b).unwrap());
    }

    #[test]
    fn test_failed_transfer_reference_replays_failure() {
        let store = Arc::new(LedgerStore::new());
        let engine = LedgerEngine::new(store.clone());
        let a = store.open_account("a@example.com", "A", Currency::ngn());
        let b = store.open_account("b@example.com", "B", Currency::ngn());
        let reference = Reference::new("TXRENT00000001");

        let first = engine
            .transfer(a.id, b.id, ngn(dec!(100.00)), "Rent", Some(reference.clone()))
            .unwrap_err();
        assert!(matches!(first, WalletError::InsufficientFunds { .. }));

        engine
            .apply_entry(EntryRequest::new(
                a.id,
                Direction::Credit,
                Category::Deposit,
                ngn(dec!(1000.00)),
            ))
            .unwrap();

        // the reference pinned the failed outcome; funding does not change it
        let retry = engine
            .transfer(a.id, b.id, ngn(dec!(100.00)), "Rent", Some(reference))
            .unwrap_err();
        assert!(matches!(retry, WalletError::InsufficientFunds { .. }));
        assert_eq!(engine.balance(&a.id).unwrap().value, dec!(1000.00));
        assert_eq!(engine.balance(&b.id).unwrap().value, dec!(0));

        // a fresh reference makes a fresh attempt
        engine
            .transfer(a.id, b.id, ngn(dec!(100.00)), "Rent", None)
            .unwrap();
        assert_eq!(engine.balance(&b.id).unwrap().value, dec!(100.00));
    }

    #[test]
    fn test_duplicate_reference_replay_survives_freezing() {
        let (engine, account) = engine_with_account(dec!(1000.00));
        let reference = Reference::new("TXFREEZE000001");

        let first = engine
            .apply_entry(
                EntryRequest::new(
                    account,
                    Direction::Debit,
                    Category::Withdrawal,
                    ngn(dec!(100.00)),
                )
                .with_reference(reference.clone()),
            )
            .unwrap();

        engine.store().freeze_account(&account).unwrap();

        let replay = engine
            .apply_entry(
                EntryRequest::new(
                    account,
                    Direction::Debit,
                    Category::Withdrawal,
                    ngn(dec!(100.00)),
                )
                .with_reference(reference),
            )
            .unwrap();

        assert_eq!(replay.id, first.id);
        assert_eq!(engine.balance(&account).unwrap().value, dec!(900.00));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// For any sequence of credits and debits the balance equals the
            /// sum of completed credits minus completed debits.
            #[test]
            fn balance_matches_completed_entries(ops in proptest::collection::vec((any::<bool>(), 1u32..=1000), 1..40)) {
                let store = Arc::new(LedgerStore::new());
                let engine = LedgerEngine::new(store.clone());
                let account = store.open_account("p@example.com", "P", Currency::ngn());

                let mut expected = Decimal::ZERO;
                for (is_credit, units) in ops {
                    let amount = Decimal::from(units);
                    let direction = if is_credit { Direction::Credit } else { Direction::Debit };
                    let category = if is_credit { Category::Deposit } else { Category::Withdrawal };
                    let result = engine.apply_entry(EntryRequest::new(
                        account.id,
                        direction,
                        category,
                        ngn(amount),
                    ));
                    match result {
                        Ok(_) if is_credit => expected += amount,
                        Ok(_) => expected -= amount,
                        Err(WalletError::InsufficientFunds { .. }) => {}
                        Err(e) => return Err(TestCaseError::fail(format!("unexpected error: {e}"))),
                    }
                }

                prop_assert_eq!(engine.balance(&account.id).unwrap().value, expected);
                prop_assert!(engine.reconcile(&account.id).unwrap());
                prop_assert!(expected >= Decimal::ZERO);
            }
        }
    }
}
