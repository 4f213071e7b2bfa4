//! WalletCore Provider Contracts
//!
//! Abstract contracts for the external collaborators a wallet depends on:
//! bank account resolution, payout submission, biller catalogs, and crypto
//! price quotes. Wire formats are provider-specific and out of scope; these
//! traits define what the orchestrator needs and nothing more. Mock
//! implementations live behind the `test-utils` feature.

pub mod biller;
pub mod error;
pub mod payout;
pub mod rates;
pub mod resolution;

#[cfg(any(test, feature = "test-utils"))]
pub(crate) mod fault;

pub use biller::{BillPayment, Biller, BillerCatalog, BillerKind, BillerProduct, PaymentReceipt};
pub use error::{ProviderError, ProviderResult};
pub use payout::{PayoutGateway, PayoutInstruction, PayoutReceipt};
pub use rates::{CryptoQuote, RateSource};
pub use resolution::{AccountResolver, ResolvedAccount};

#[cfg(any(test, feature = "test-utils"))]
pub use biller::MockBillerCatalog;
#[cfg(any(test, feature = "test-utils"))]
pub use payout::MockPayoutGateway;
#[cfg(any(test, feature = "test-utils"))]
pub use rates::MockRateSource;
#[cfg(any(test, feature = "test-utils"))]
pub use resolution::MockResolver;
