//! Bank account resolution contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};

/// A bank account whose holder name has been confirmed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAccount {
    /// NUBAN account number.
    pub account_number: String,
    /// Bank code identifying the institution.
    pub bank_code: String,
    /// Account holder name as held by the bank.
    pub account_name: String,
}

/// Resolves a bank account number to its holder before a payout.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Resolve an account number at a bank.
    async fn resolve(&self, account_number: &str, bank_code: &str)
        -> ProviderResult<ResolvedAccount>;
}

/// Mock resolver for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockResolver {
    accounts: dashmap::DashMap<(String, String), String>,
    failure: crate::fault::Toggle,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockResolver {
    /// Create an empty mock resolver.
    pub fn new() -> Self {
        Self {
            accounts: dashmap::DashMap::new(),
            failure: Default::default(),
        }
    }

    /// Register a resolvable account.
    pub fn add_account(
        &self,
        account_number: impl Into<String>,
        bank_code: impl Into<String>,
        account_name: impl Into<String>,
    ) {
        self.accounts.insert(
            (account_number.into(), bank_code.into()),
            account_name.into(),
        );
    }

    /// Make the next resolution fail with the given reason.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.failure.set(reason);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl AccountResolver for MockResolver {
    fn name(&self) -> &str {
        "mock-resolver"
    }

    async fn resolve(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> ProviderResult<ResolvedAccount> {
        if let Some(reason) = self.failure.take() {
            return Err(ProviderError::Unreachable {
                provider: self.name().to_string(),
                reason,
            });
        }
        self.accounts
            .get(&(account_number.to_string(), bank_code.to_string()))
            .map(|name| ResolvedAccount {
                account_number: account_number.to_string(),
                bank_code: bank_code.to_string(),
                account_name: name.clone(),
            })
            .ok_or_else(|| {
                ProviderError::ResolutionFailed(format!("{account_number} at {bank_code}"))
            })
    }
}
