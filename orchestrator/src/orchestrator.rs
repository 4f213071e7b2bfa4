//! Purchase/transfer orchestrator.
//!
//! Composes ledger operations with provider calls and category-specific
//! purchase details. Every provider call completes before the atomic unit
//! that mutates the ledger begins; a provider failure therefore aborts with
//! no balance change, and no atomic unit is ever held open across a network
//! call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use walletcore_common::{
    AccountId, Category, Counterparty, Direction, ExternalReference, LedgerEntry, Money,
    PurchaseDetail, Reference, Result, WalletError,
};
use walletcore_ledger::{EntryRequest, LedgerEngine, SettlementOutcome, SettlementTracker};
use walletcore_providers::{
    AccountResolver, BillPayment, BillerCatalog, PayoutGateway, PayoutInstruction, ProviderResult,
    RateSource,
};

use crate::config::OrchestratorConfig;
use crate::directory::RecipientDirectory;

/// A money-movement request.
#[derive(Debug, Clone)]
pub enum WalletOperation {
    /// Wallet-to-wallet transfer, recipient looked up by email.
    Transfer {
        from: AccountId,
        recipient_email: String,
        amount: Money,
        description: String,
        reference: Option<Reference>,
    },
    /// Withdrawal to an external bank account.
    Withdrawal {
        account: AccountId,
        account_number: String,
        bank_code: String,
        amount: Money,
        reference: Option<Reference>,
    },
    /// Externally-settled deposit (webhook path).
    Deposit {
        account: AccountId,
        external_reference: ExternalReference,
        amount: Money,
    },
    /// Crypto purchase; `spend` is the wallet-currency amount to convert.
    CryptoPurchase {
        account: AccountId,
        asset: String,
        spend: Money,
        wallet_address: Option<String>,
        network: Option<String>,
        reference: Option<Reference>,
    },
    /// Open-amount airtime top-up.
    AirtimePurchase {
        account: AccountId,
        biller_code: String,
        phone_number: String,
        amount: Money,
        reference: Option<Reference>,
    },
    /// Data bundle purchase; the product code is mandatory.
    DataPurchase {
        account: AccountId,
        biller_code: String,
        product_code: Option<String>,
        phone_number: String,
        amount: Money,
        reference: Option<Reference>,
    },
}

impl WalletOperation {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            WalletOperation::Transfer { .. } => "transfer",
            WalletOperation::Withdrawal { .. } => "withdrawal",
            WalletOperation::Deposit { .. } => "deposit",
            WalletOperation::CryptoPurchase { .. } => "crypto_purchase",
            WalletOperation::AirtimePurchase { .. } => "airtime_purchase",
            WalletOperation::DataPurchase { .. } => "data_purchase",
        }
    }
}

/// What an executed operation produced.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// A single ledger entry (withdrawal, purchases).
    Entry(LedgerEntry),
    /// The two correlated legs of a transfer.
    Transfer {
        debit: LedgerEntry,
        credit: LedgerEntry,
    },
    /// A settlement result (deposit path).
    Settlement(SettlementOutcome),
}

/// Executes wallet operations against the ledger and external providers.
pub struct Orchestrator {
    engine: LedgerEngine,
    tracker: SettlementTracker,
    directory: Arc<RecipientDirectory>,
    resolver: Arc<dyn AccountResolver>,
    payouts: Arc<dyn PayoutGateway>,
    billers: Arc<dyn BillerCatalog>,
    rates: Arc<dyn RateSource>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: LedgerEngine,
        directory: Arc<RecipientDirectory>,
        resolver: Arc<dyn AccountResolver>,
        payouts: Arc<dyn PayoutGateway>,
        billers: Arc<dyn BillerCatalog>,
        rates: Arc<dyn RateSource>,
        config: OrchestratorConfig,
    ) -> Self {
        let tracker = SettlementTracker::new(engine.clone());
        Self {
            engine,
            tracker,
            directory,
            resolver,
            payouts,
            billers,
            rates,
            config,
        }
    }

    /// The underlying ledger engine.
    pub fn engine(&self) -> &LedgerEngine {
        &self.engine
    }

    /// The settlement tracker.
    pub fn tracker(&self) -> &SettlementTracker {
        &self.tracker
    }

    /// Execute one wallet operation.
    #[instrument(skip(self, operation), fields(kind = operation.kind()))]
    pub async fn execute(&self, operation: WalletOperation) -> Result<ExecutionOutcome> {
        match operation {
            WalletOperation::Transfer {
                from,
                recipient_email,
                amount,
                description,
                reference,
            } => {
                let recipient = self.directory.resolve(&recipient_email)?;
                let (debit, credit) =
                    self.engine
                        .transfer(from, recipient, amount, description, reference)?;
                Ok(ExecutionOutcome::Transfer { debit, credit })
            }

            WalletOperation::Withdrawal {
                account,
                account_number,
                bank_code,
                amount,
                reference,
            } => self
                .withdraw(account, account_number, bank_code, amount, reference)
                .await
                .map(ExecutionOutcome::Entry),

            WalletOperation::Deposit {
                account,
                external_reference,
                amount,
            } => {
                let outcome = self.tracker.settle(account, external_reference, amount)?;
                Ok(ExecutionOutcome::Settlement(outcome))
            }

            WalletOperation::CryptoPurchase {
                account,
                asset,
                spend,
                wallet_address,
                network,
                reference,
            } => self
                .buy_crypto(account, asset, spend, wallet_address, network, reference)
                .await
                .map(ExecutionOutcome::Entry),

            WalletOperation::AirtimePurchase {
                account,
                biller_code,
                phone_number,
                amount,
                reference,
            } => self
                .buy_airtime(account, biller_code, phone_number, amount, reference)
                .await
                .map(ExecutionOutcome::Entry),

            WalletOperation::DataPurchase {
                account,
                biller_code,
                product_code,
                phone_number,
                amount,
                reference,
            } => self
                .buy_data(
                    account,
                    biller_code,
                    product_code,
                    phone_number,
                    amount,
                    reference,
                )
                .await
                .map(ExecutionOutcome::Entry),
        }
    }

    async fn withdraw(
        &self,
        account: AccountId,
        account_number: String,
        bank_code: String,
        amount: Money,
        reference: Option<Reference>,
    ) -> Result<LedgerEntry> {
        self.ensure_can_cover(&account, &amount)?;

        let resolved = self
            .with_timeout(
                self.resolver.name(),
                self.resolver.resolve(&account_number, &bank_code),
            )
            .await?;
        let instruction = PayoutInstruction {
            account_number: resolved.account_number.clone(),
            bank_code: resolved.bank_code.clone(),
            account_name: Some(resolved.account_name.clone()),
            narration: self.config.provider.payout_narration.clone(),
        };
        let receipt = self
            .with_timeout(self.payouts.name(), self.payouts.submit(&instruction, &amount))
            .await?;
        info!(
            provider_reference = %receipt.provider_reference,
            "Payout submitted"
        );

        let mut metadata = HashMap::new();
        metadata.insert(
            "provider_reference".to_string(),
            receipt.provider_reference,
        );

        let mut request = EntryRequest::new(account, Direction::Debit, Category::Withdrawal, amount)
            .with_counterparty(Counterparty::Bank {
                account_number,
                bank_code,
                account_name: Some(resolved.account_name.clone()),
            })
            .with_description(format!("Withdrawal to {}", resolved.account_name))
            .with_metadata(metadata);
        if let Some(r) = reference {
            request = request.with_reference(r);
        }
        self.engine.apply_entry(request)
    }

    async fn buy_crypto(
        &self,
        account: AccountId,
        asset: String,
        spend: Money,
        wallet_address: Option<String>,
        network: Option<String>,
        reference: Option<Reference>,
    ) -> Result<LedgerEntry> {
        self.ensure_can_cover(&account, &spend)?;

        let quote = self
            .with_timeout(self.rates.name(), self.rates.quote(&asset))
            .await?;
        if quote.currency != spend.currency {
            return Err(WalletError::CurrencyMismatch {
                expected: spend.currency.code().to_string(),
                actual: quote.currency.code().to_string(),
            });
        }
        if quote.rate <= Decimal::ZERO {
            return Err(WalletError::ExternalProviderFailure {
                provider: self.rates.name().to_string(),
                reason: format!("non-positive rate {} for {asset}", quote.rate),
            });
        }

        let amount_crypto = spend.value / quote.rate;
        let mut metadata = HashMap::new();
        metadata.insert("exchange_rate".to_string(), quote.rate.to_string());

        let mut request = EntryRequest::new(account, Direction::Debit, Category::CryptoBuy, spend)
            .with_counterparty(Counterparty::External(self.rates.name().to_string()))
            .with_detail(PurchaseDetail::Crypto {
                asset: asset.clone(),
                amount_crypto,
                exchange_rate: quote.rate,
                wallet_address,
                network,
            })
            .with_description(format!("Purchase of {amount_crypto} {asset}"))
            .with_metadata(metadata);
        if let Some(r) = reference {
            request = request.with_reference(r);
        }
        self.engine.apply_entry(request)
    }

    async fn buy_airtime(
        &self,
        account: AccountId,
        biller_code: String,
        phone_number: String,
        amount: Money,
        reference: Option<Reference>,
    ) -> Result<LedgerEntry> {
        self.ensure_can_cover(&account, &amount)?;

        let receipt = self
            .with_timeout(
                self.billers.name(),
                self.billers.pay(&BillPayment {
                    biller_code: biller_code.clone(),
                    product_code: None,
                    phone_number: phone_number.clone(),
                    amount: amount.clone(),
                }),
            )
            .await?;

        let mut metadata = HashMap::new();
        metadata.insert("provider_reference".to_string(), receipt.provider_reference);

        let mut request = EntryRequest::new(account, Direction::Debit, Category::Airtime, amount)
            .with_counterparty(Counterparty::External(self.billers.name().to_string()))
            .with_detail(PurchaseDetail::Airtime {
                phone_number: phone_number.clone(),
                network: biller_code,
                plan_name: None,
            })
            .with_description(format!("Airtime top-up for {phone_number}"))
            .with_metadata(metadata);
        if let Some(r) = reference {
            request = request.with_reference(r);
        }
        self.engine.apply_entry(request)
    }

    async fn buy_data(
        &self,
        account: AccountId,
        biller_code: String,
        product_code: Option<String>,
        phone_number: String,
        amount: Money,
        reference: Option<Reference>,
    ) -> Result<LedgerEntry> {
        // Data bundles are always a specific product; rejected before any
        // provider call or mutation.
        let product_code = product_code.ok_or_else(|| WalletError::InvalidRequest {
            message: "data purchases require a product code".to_string(),
            field: Some("product_code".to_string()),
        })?;

        self.ensure_can_cover(&account, &amount)?;

        let products = self
            .with_timeout(self.billers.name(), self.billers.products(&biller_code))
            .await?;
        let product = products.into_iter().find(|p| p.code == product_code);

        let receipt = self
            .with_timeout(
                self.billers.name(),
                self.billers.pay(&BillPayment {
                    biller_code: biller_code.clone(),
                    product_code: Some(product_code.clone()),
                    phone_number: phone_number.clone(),
                    amount: amount.clone(),
                }),
            )
            .await?;

        let mut metadata = HashMap::new();
        metadata.insert("provider_reference".to_string(), receipt.provider_reference);

        let data_plan = product
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| product_code.clone());
        let validity = product.and_then(|p| p.validity);

        let mut request = EntryRequest::new(account, Direction::Debit, Category::Data, amount)
            .with_counterparty(Counterparty::External(self.billers.name().to_string()))
            .with_detail(PurchaseDetail::Data {
                phone_number: phone_number.clone(),
                network: biller_code,
                data_plan: data_plan.clone(),
                validity,
            })
            .with_description(format!("{data_plan} for {phone_number}"))
            .with_metadata(metadata);
        if let Some(r) = reference {
            request = request.with_reference(r);
        }
        self.engine.apply_entry(request)
    }

    /// Run a provider call under the configured timeout. A timed-out call
    /// surfaces as a retryable provider failure before any ledger mutation.
    async fn with_timeout<T>(
        &self,
        provider: &str,
        call: impl Future<Output = ProviderResult<T>>,
    ) -> Result<T> {
        let timeout = self.config.provider.request_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map_err(WalletError::from),
            Err(_) => {
                warn!(provider, ?timeout, "Provider call timed out");
                Err(WalletError::ExternalProviderFailure {
                    provider: provider.to_string(),
                    reason: format!("no response within {timeout:?}"),
                })
            }
        }
    }

    /// Advisory pre-check run before any provider call. The debit re-checks
    /// everything under the account lock; this only prevents submitting a
    /// payout or bill payment the wallet clearly cannot cover.
    fn ensure_can_cover(&self, account_id: &AccountId, amount: &Money) -> Result<()> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(format!(
                "amount must be positive, got {}",
                amount.value
            )));
        }
        let account = self
            .engine
            .store()
            .account(account_id)
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
        if account.balance < amount.value {
            return Err(WalletError::InsufficientFunds {
                required: amount.value.to_string(),
                available: account.balance.to_string(),
            });
        }
        Ok(())
    }
}
