//! Provider error types.

use thiserror::Error;
use walletcore_common::WalletError;

/// Errors returned by external provider contracts.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider could not be reached.
    #[error("{provider} is unreachable: {reason}")]
    Unreachable { provider: String, reason: String },

    /// The provider rejected the request.
    #[error("{provider} rejected the request: {reason}")]
    Rejected { provider: String, reason: String },

    /// A bank account could not be resolved.
    #[error("Account could not be resolved: {0}")]
    ResolutionFailed(String),

    /// The requested biller product does not exist.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// No price quote is available for the asset.
    #[error("Quote not available for {0}")]
    QuoteNotAvailable(String),
}

impl ProviderError {
    /// The provider a caller should attribute this failure to.
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Unreachable { provider, .. } => provider,
            ProviderError::Rejected { provider, .. } => provider,
            ProviderError::ResolutionFailed(_) => "account-resolver",
            ProviderError::UnknownProduct(_) => "biller-catalog",
            ProviderError::QuoteNotAvailable(_) => "rate-source",
        }
    }
}

impl From<ProviderError> for WalletError {
    fn from(e: ProviderError) -> Self {
        WalletError::ExternalProviderFailure {
            provider: e.provider().to_string(),
            reason: e.to_string(),
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
