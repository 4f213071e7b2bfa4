//! WalletCore Common Types
//!
//! This crate contains shared types used across the WalletCore ledger,
//! including identifiers, monetary types, the ledger entry model, and the
//! error taxonomy.

pub mod entry;
pub mod error;
pub mod identifiers;
pub mod monetary;

pub use entry::*;
pub use error::*;
pub use identifiers::*;
pub use monetary::*;
