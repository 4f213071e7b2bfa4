//! Biller catalog contract for airtime and data fulfillment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walletcore_common::Money;

use crate::error::{ProviderError, ProviderResult};

/// What a biller sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillerKind {
    /// Airtime top-up.
    Airtime,
    /// Data bundles.
    Data,
}

/// A mobile network or service provider in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Biller {
    /// Provider-side biller code.
    pub code: String,
    /// Display name (MTN, Airtel, ...).
    pub name: String,
    /// What this biller sells.
    pub kind: BillerKind,
}

/// A purchasable product under a biller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillerProduct {
    /// Provider-side product code.
    pub code: String,
    /// Display name ("1.5GB Monthly", ...).
    pub name: String,
    /// Fixed price, when the product is not open-amount.
    pub price: Option<Money>,
    /// Bundle validity ("30 days", ...).
    pub validity: Option<String>,
}

/// A bill payment to fulfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPayment {
    /// Biller to pay.
    pub biller_code: String,
    /// Product code; required for data bundles, absent for open-amount airtime.
    pub product_code: Option<String>,
    /// Phone number to top up.
    pub phone_number: String,
    /// Amount to pay.
    pub amount: Money,
}

/// Provider acknowledgement of a fulfilled bill payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Provider-side reference for the payment.
    pub provider_reference: String,
}

/// Catalog and payment contract for airtime/data billers.
#[async_trait]
pub trait BillerCatalog: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// List billers of a kind.
    async fn billers(&self, kind: BillerKind) -> ProviderResult<Vec<Biller>>;

    /// List products under a biller.
    async fn products(&self, biller_code: &str) -> ProviderResult<Vec<BillerProduct>>;

    /// Fulfill a bill payment.
    async fn pay(&self, payment: &BillPayment) -> ProviderResult<PaymentReceipt>;
}

/// Mock biller catalog for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockBillerCatalog {
    billers: dashmap::DashMap<String, Biller>,
    products: dashmap::DashMap<String, Vec<BillerProduct>>,
    paid: dashmap::DashMap<String, BillPayment>,
    failure: crate::fault::Toggle,
    counter: std::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockBillerCatalog {
    /// Create an empty mock catalog.
    pub fn new() -> Self {
        Self {
            billers: dashmap::DashMap::new(),
            products: dashmap::DashMap::new(),
            paid: dashmap::DashMap::new(),
            failure: Default::default(),
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Register a biller.
    pub fn add_biller(&self, biller: Biller) {
        self.billers.insert(biller.code.clone(), biller);
    }

    /// Register a product under a biller.
    pub fn add_product(&self, biller_code: impl Into<String>, product: BillerProduct) {
        self.products
            .entry(biller_code.into())
            .or_default()
            .push(product);
    }

    /// Make the next payment fail with the given reason.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.failure.set(reason);
    }

    /// Number of payments fulfilled so far.
    pub fn paid_count(&self) -> usize {
        self.paid.len()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockBillerCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl BillerCatalog for MockBillerCatalog {
    fn name(&self) -> &str {
        "mock-billers"
    }

    async fn billers(&self, kind: BillerKind) -> ProviderResult<Vec<Biller>> {
        Ok(self
            .billers
            .iter()
            .filter(|b| b.kind == kind)
            .map(|b| b.clone())
            .collect())
    }

    async fn products(&self, biller_code: &str) -> ProviderResult<Vec<BillerProduct>> {
        self.products
            .get(biller_code)
            .map(|p| p.clone())
            .ok_or_else(|| ProviderError::UnknownProduct(biller_code.to_string()))
    }

    async fn pay(&self, payment: &BillPayment) -> ProviderResult<PaymentReceipt> {
        if let Some(reason) = self.failure.take() {
            return Err(ProviderError::Rejected {
                provider: self.name().to_string(),
                reason,
            });
        }
        if !self.billers.contains_key(&payment.biller_code) {
            return Err(ProviderError::UnknownProduct(payment.biller_code.clone()));
        }
        if let Some(code) = &payment.product_code {
            let known = self
                .products
                .get(&payment.biller_code)
                .map(|products| products.iter().any(|p| &p.code == code))
                .unwrap_or(false);
            if !known {
                return Err(ProviderError::UnknownProduct(code.clone()));
            }
        }
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let provider_reference = format!("bill_{n:06}");
        self.paid.insert(provider_reference.clone(), payment.clone());
        Ok(PaymentReceipt { provider_reference })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use walletcore_common::Currency;

    fn catalog() -> MockBillerCatalog {
        let catalog = MockBillerCatalog::new();
        catalog.add_biller(Biller {
            code: "mtn-data".to_string(),
            name: "MTN".to_string(),
            kind: BillerKind::Data,
        });
        catalog.add_product(
            "mtn-data",
            BillerProduct {
                code: "mtn-1gb-30d".to_string(),
                name: "1GB Monthly".to_string(),
                price: Some(Money::new(dec!(300.00), Currency::ngn())),
                validity: Some("30 days".to_string()),
            },
        );
        catalog
    }

    #[tokio::test]
    async fn test_catalog_lists_by_kind() {
        let catalog = catalog();
        let data = catalog.billers(BillerKind::Data).await.unwrap();
        assert_eq!(data.len(), 1);
        let airtime = catalog.billers(BillerKind::Airtime).await.unwrap();
        assert!(airtime.is_empty());
    }

    #[tokio::test]
    async fn test_pay_known_product() {
        let catalog = catalog();
        let receipt = catalog
            .pay(&BillPayment {
                biller_code: "mtn-data".to_string(),
                product_code: Some("mtn-1gb-30d".to_string()),
                phone_number: "08012345678".to_string(),
                amount: Money::new(dec!(300.00), Currency::ngn()),
            })
            .await
            .unwrap();
        assert!(receipt.provider_reference.starts_with("bill_"));
        assert_eq!(catalog.paid_count(), 1);
    }

    #[tokio::test]
    async fn test_pay_unknown_product_rejected() {
        let catalog = catalog();
        let err = catalog
            .pay(&BillPayment {
                biller_code: "mtn-data".to_string(),
                product_code: Some("mtn-99gb".to_string()),
                phone_number: "08012345678".to_string(),
                amount: Money::new(dec!(300.00), Currency::ngn()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProduct(_)));
        assert_eq!(catalog.paid_count(), 0);
    }
}
