//! In-memory ledger store with per-account exclusive locks.
//!
//! The store is the single owner of accounts, the journal, the reference
//! index, and settlement records. Mutating operations (in `engine` and
//! `settlement`) serialize per account by holding that account's lock for the
//! whole read-check-write sequence, which is the embedded-store equivalent of
//! a `SELECT ... FOR UPDATE` row lock.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::info;

use walletcore_common::{
    AccountId, Currency, EntryId, ExternalReference, LedgerEntry, Reference, Result,
    TransferGroupId, WalletError,
};

use crate::account::Account;
use crate::settlement::SettlementRecord;

/// In-memory account, journal, and settlement storage.
pub struct LedgerStore {
    /// Accounts by ID.
    pub(crate) accounts: DashMap<AccountId, Account>,
    /// Journal entries by ID.
    pub(crate) entries: DashMap<EntryId, LedgerEntry>,
    /// Journal index by account, in creation order.
    pub(crate) entries_by_account: DashMap<AccountId, Vec<EntryId>>,
    /// Reference uniqueness index.
    pub(crate) by_reference: DashMap<Reference, EntryId>,
    /// Settlement records by external reference.
    pub(crate) settlements: DashMap<ExternalReference, SettlementRecord>,
    /// Per-account exclusive locks.
    account_locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl LedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            entries: DashMap::new(),
            entries_by_account: DashMap::new(),
            by_reference: DashMap::new(),
            settlements: DashMap::new(),
            account_locks: DashMap::new(),
        }
    }

    /// Open a new account with a zero balance.
    pub fn open_account(
        &self,
        email: impl Into<String>,
        name: impl Into<String>,
        currency: Currency,
    ) -> Account {
        let account = Account::new(email, name, currency);
        let id = account.id;

        self.accounts.insert(id, account.clone());
        self.account_locks.insert(id, Arc::new(Mutex::new(())));
        self.entries_by_account.insert(id, Vec::new());

        info!(account = %id, email = %account.email, "Account opened");
        account
    }

    /// Get an account by ID.
    pub fn account(&self, id: &AccountId) -> Option<Account> {
        self.accounts.get(id).map(|a| a.clone())
    }

    /// Freeze an account.
    pub fn freeze_account(&self, id: &AccountId) -> Result<()> {
        let lock = self.account_lock(id)?;
        let _guard = lock.lock();
        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or(WalletError::AccountNotFound(*id))?;
        account.freeze();
        info!(account = %id, "Account frozen");
        Ok(())
    }

    /// Unfreeze an account.
    pub fn unfreeze_account(&self, id: &AccountId) -> Result<()> {
        let lock = self.account_lock(id)?;
        let _guard = lock.lock();
        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or(WalletError::AccountNotFound(*id))?;
        account.unfreeze();
        info!(account = %id, "Account unfrozen");
        Ok(())
    }

    /// Close an account (soft lifecycle; the account and its journal remain).
    pub fn close_account(&self, id: &AccountId) -> Result<()> {
        let lock = self.account_lock(id)?;
        let _guard = lock.lock();
        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or(WalletError::AccountNotFound(*id))?;
        account.close();
        info!(account = %id, "Account closed");
        Ok(())
    }

    /// Get a journal entry by ID.
    pub fn entry(&self, id: &EntryId) -> Option<LedgerEntry> {
        self.entries.get(id).map(|e| e.clone())
    }

    /// Get a journal entry by reference.
    pub fn entry_by_reference(&self, reference: &Reference) -> Option<LedgerEntry> {
        self.by_reference
            .get(reference)
            .and_then(|id| self.entry(&id))
    }

    /// Get all journal entries for an account, in creation order.
    pub fn entries_for_account(&self, account_id: &AccountId) -> Vec<LedgerEntry> {
        self.entries_by_account
            .get(account_id)
            .map(|ids| ids.iter().filter_map(|id| self.entry(id)).collect())
            .unwrap_or_default()
    }

    /// Get the entries sharing a transfer group.
    pub fn entries_in_group(&self, group: &TransferGroupId) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.transfer_group.as_ref() == Some(group))
            .map(|e| e.clone())
            .collect()
    }

    /// Get a settlement record by external reference.
    pub fn settlement_record(&self, reference: &ExternalReference) -> Option<SettlementRecord> {
        self.settlements.get(reference).map(|r| r.clone())
    }

    /// Get the exclusive lock for an account.
    ///
    /// The lock must be held for the whole duration of any mutating
    /// operation on the account. For two-account operations the caller
    /// acquires locks in ascending account-id order.
    pub(crate) fn account_lock(&self, id: &AccountId) -> Result<Arc<Mutex<()>>> {
        self.account_locks
            .get(id)
            .map(|l| l.clone())
            .ok_or(WalletError::AccountNotFound(*id))
    }

    /// Reserve a reference for an entry. Returns the existing entry ID if the
    /// reference has already been used. The check-and-insert is atomic.
    pub(crate) fn reserve_reference(
        &self,
        reference: &Reference,
        entry_id: EntryId,
    ) -> std::result::Result<(), EntryId> {
        match self.by_reference.entry(reference.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => Err(*existing.get()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry_id);
                Ok(())
            }
        }
    }

    /// Append a journal entry. Caller holds the account lock.
    pub(crate) fn commit_entry(&self, entry: LedgerEntry) {
        self.entries_by_account
            .entry(entry.account_id)
            .or_default()
            .push(entry.id);
        self.entries.insert(entry.id, entry);
    }

    /// Set an account balance. Caller holds the account lock and has already
    /// validated the new balance.
    pub(crate) fn set_balance(&self, id: &AccountId, balance: Decimal) -> Result<()> {
        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or(WalletError::AccountNotFound(*id))?;
        account.balance = balance;
        account.updated_at = chrono::Utc::now();
        Ok(())
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}
