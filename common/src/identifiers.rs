//! Identifier types for WalletCore entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a wallet account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Create a new account ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ledger entry.
/// Uses UUID v7 so the journal sorts in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new entry ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier shared by the two legs of an internal transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferGroupId(Uuid);

impl TransferGroupId {
    /// Create a new transfer group ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransferGroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique transaction reference.
///
/// Generated references take the form `TX` followed by twelve uppercase hex
/// characters. Caller-supplied references are accepted as-is and serve as the
/// idempotency handle for retried operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference(String);

impl Reference {
    /// Maximum accepted reference length.
    pub const MAX_LEN: usize = 255;

    /// Create a reference from a caller-supplied string.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Generate a fresh unique reference.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("TX{}", &hex[..12]))
    }

    /// Get the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the reference format.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= Self::MAX_LEN
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Reference {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Reference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Provider-supplied reference identifying one real-world payment event.
/// Existence of a settlement record under this key is the idempotency guard
/// for webhook-driven credits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalReference(String);

impl ExternalReference {
    /// Create a new external reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Get the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the reference format.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= Reference::MAX_LEN
    }
}

impl fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExternalReference {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ExternalReference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_creation() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_account_id_ordering_is_total() {
        let mut ids = vec![AccountId::new(), AccountId::new(), AccountId::new()];
        ids.sort();
        assert!(ids[0] <= ids[1] && ids[1] <= ids[2]);
    }

    #[test]
    fn test_entry_id_parse() {
        let uuid_str = "019456ab-1234-7def-8901-234567890abc";
        let id = EntryId::parse(uuid_str).unwrap();
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn test_generated_reference_shape() {
        let reference = Reference::generate();
        let s = reference.as_str();
        assert!(s.starts_with("TX"));
        assert_eq!(s.len(), 14);
        assert!(s[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(reference.is_valid());
    }

    #[test]
    fn test_generated_references_unique() {
        assert_ne!(Reference::generate(), Reference::generate());
    }

    #[test]
    fn test_reference_validation() {
        assert!(Reference::new("TX000011112222").is_valid());
        assert!(!Reference::new("").is_valid());
        assert!(!Reference::new("x".repeat(300)).is_valid());
    }
}
