//! WalletCore Ledger Engine
//!
//! Balance ledger with atomic debit/credit application, an append-only
//! journal, and idempotent settlement of externally-triggered deposits.

pub mod account;
pub mod engine;
pub mod settlement;
pub mod store;

pub use account::{Account, AccountStatus};
pub use engine::{EntryRequest, LedgerEngine};
pub use settlement::{SettlementOutcome, SettlementRecord, SettlementTracker};
pub use store::LedgerStore;
