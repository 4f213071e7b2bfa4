//! Error types for WalletCore operations.

use crate::{AccountId, EntryStatus, Reference};
use thiserror::Error;

/// Main error type for WalletCore operations.
#[derive(Error, Debug)]
pub enum WalletError {
    /// Amount is zero, negative, or otherwise unusable.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed or incomplete request.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    /// Insufficient funds for a debit.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    /// Reference already used by another entry.
    #[error("Duplicate reference: {0}")]
    DuplicateReference(Reference),

    /// Transfer recipient could not be resolved.
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// Account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account exists but cannot transact.
    #[error("Account frozen or closed: {0}")]
    AccountFrozen(AccountId),

    /// Amount currency does not match the account currency.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// External collaborator call failed (network or non-success response).
    #[error("Provider failure ({provider}): {reason}")]
    ExternalProviderFailure { provider: String, reason: String },

    /// Invalid webhook signature.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Invalid entry status transition.
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: EntryStatus, to: EntryStatus },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl WalletError {
    /// Check if this error is retryable.
    ///
    /// Provider failures abort before any ledger mutation, so the caller may
    /// retry the whole operation; validation errors are surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::ExternalProviderFailure { .. })
    }

    /// Get error code for API surfaces.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::InvalidRequest { .. } => "INVALID_REQUEST",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::DuplicateReference(_) => "DUPLICATE_REFERENCE",
            WalletError::RecipientNotFound(_) => "RECIPIENT_NOT_FOUND",
            WalletError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            WalletError::AccountFrozen(_) => "ACCOUNT_FROZEN",
            WalletError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            WalletError::ExternalProviderFailure { .. } => "PROVIDER_FAILURE",
            WalletError::InvalidSignature => "INVALID_SIGNATURE",
            WalletError::InvalidTransition { .. } => "INVALID_TRANSITION",
            WalletError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<crate::entry::InvalidEntryTransition> for WalletError {
    fn from(err: crate::entry::InvalidEntryTransition) -> Self {
        WalletError::InvalidTransition {
            from: err.from,
            to: err.to,
        }
    }
}

/// Result type alias for WalletCore operations.
pub type Result<T> = std::result::Result<T, WalletError>;
