//! WalletCore Orchestrator
//!
//! Composes the ledger engine, settlement tracker, and external provider
//! contracts into wallet operations: transfers, withdrawals, purchases, and
//! webhook-driven deposits.

pub mod config;
pub mod directory;
pub mod orchestrator;
pub mod webhook;

pub use config::{OrchestratorConfig, ProviderConfig, WebhookConfig};
pub use directory::RecipientDirectory;
pub use orchestrator::{ExecutionOutcome, Orchestrator, WalletOperation};
pub use webhook::{
    CustomerIdentity, DepositData, DepositEvent, WebhookDisposition, WebhookReceiver,
    WebhookVerifier,
};
