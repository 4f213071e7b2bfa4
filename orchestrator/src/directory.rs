//! Recipient directory: email to account-id resolution.
//!
//! Email is a lookup key, not a stable identity key. Settlement and all
//! ledger operations are keyed by `AccountId`; the directory translates the
//! identity a caller or webhook carries into that key before any atomic work
//! begins.

use dashmap::DashMap;
use tracing::info;
use walletcore_common::{AccountId, Result, WalletError};

/// Maps lowercased email addresses to account ids.
pub struct RecipientDirectory {
    by_email: DashMap<String, AccountId>,
}

impl RecipientDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            by_email: DashMap::new(),
        }
    }

    /// Register an account under an email. Re-registering an email (an email
    /// change) points it at the new account.
    pub fn register(&self, email: impl Into<String>, account_id: AccountId) {
        let email = email.into().to_lowercase();
        info!(email = %email, account = %account_id, "Recipient registered");
        self.by_email.insert(email, account_id);
    }

    /// Remove an email from the directory.
    pub fn unregister(&self, email: &str) {
        self.by_email.remove(&email.to_lowercase());
    }

    /// Resolve an email to its account id.
    pub fn resolve(&self, email: &str) -> Result<AccountId> {
        self.by_email
            .get(&email.to_lowercase())
            .map(|id| *id)
            .ok_or_else(|| WalletError::RecipientNotFound(email.to_string()))
    }
}

impl Default for RecipientDirectory {
    fn default() -> Self {
        Self::new()
    }
}
