//! Crypto price quote contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use walletcore_common::Currency;

use crate::error::{ProviderError, ProviderResult};

/// A point-in-time price quote for one crypto asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoQuote {
    /// Asset symbol (BTC, ETH, USDT, ...).
    pub asset: String,
    /// Price of one unit in the quote currency.
    pub rate: Decimal,
    /// Currency the rate is quoted in.
    pub currency: Currency,
    /// When the quote was taken.
    pub quoted_at: DateTime<Utc>,
}

/// Supplies crypto price quotes; the ledger never computes rates itself.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the current quote for an asset.
    async fn quote(&self, asset: &str) -> ProviderResult<CryptoQuote>;
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    quotes: dashmap::DashMap<String, CryptoQuote>,
    failure: crate::fault::Toggle,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self {
            quotes: dashmap::DashMap::new(),
            failure: Default::default(),
        }
    }

    /// Set the quote for an asset.
    pub fn set_rate(&self, asset: impl Into<String>, rate: Decimal, currency: Currency) {
        let asset = asset.into();
        self.quotes.insert(
            asset.clone(),
            CryptoQuote {
                asset,
                rate,
                currency,
                quoted_at: Utc::now(),
            },
        );
    }

    /// Make the next quote fail with the given reason.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.failure.set(reason);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        "mock-rates"
    }

    async fn quote(&self, asset: &str) -> ProviderResult<CryptoQuote> {
        if let Some(reason) = self.failure.take() {
            return Err(ProviderError::Unreachable {
                provider: self.name().to_string(),
                reason,
            });
        }
        self.quotes
            .get(asset)
            .map(|q| q.clone())
            .ok_or_else(|| ProviderError::QuoteNotAvailable(asset.to_string()))
    }
}
