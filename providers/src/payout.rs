//! Payout gateway contract for withdrawals to external bank accounts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walletcore_common::Money;

use crate::error::{ProviderError, ProviderResult};

/// Destination bank account for a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    /// NUBAN account number.
    pub account_number: String,
    /// Bank code identifying the institution.
    pub bank_code: String,
    /// Resolved account holder name.
    pub account_name: Option<String>,
    /// Narration carried on the bank statement.
    pub narration: String,
}

/// Provider acknowledgement of a submitted payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    /// Provider-side reference for the payout.
    pub provider_reference: String,
    /// When the provider accepted the payout.
    pub submitted_at: DateTime<Utc>,
}

/// Submits payouts to bank accounts via an external transfer provider.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Submit a payout for the given amount.
    async fn submit(
        &self,
        instruction: &PayoutInstruction,
        amount: &Money,
    ) -> ProviderResult<PayoutReceipt>;
}

/// Mock payout gateway for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockPayoutGateway {
    submitted: dashmap::DashMap<String, (PayoutInstruction, Money)>,
    failure: crate::fault::Toggle,
    counter: std::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockPayoutGateway {
    /// Create a new mock gateway.
    pub fn new() -> Self {
        Self {
            submitted: dashmap::DashMap::new(),
            failure: Default::default(),
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Make the next submission fail with the given reason.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.failure.set(reason);
    }

    /// Number of payouts accepted so far.
    pub fn submitted_count(&self) -> usize {
        self.submitted.len()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockPayoutGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PayoutGateway for MockPayoutGateway {
    fn name(&self) -> &str {
        "mock-payouts"
    }

    async fn submit(
        &self,
        instruction: &PayoutInstruction,
        amount: &Money,
    ) -> ProviderResult<PayoutReceipt> {
        if let Some(reason) = self.failure.take() {
            return Err(ProviderError::Rejected {
                provider: self.name().to_string(),
                reason,
            });
        }
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let provider_reference = format!("payout_{n:06}");
        self.submitted.insert(
            provider_reference.clone(),
            (instruction.clone(), amount.clone()),
        );
        Ok(PayoutReceipt {
            provider_reference,
            submitted_at: Utc::now(),
        })
    }
}
