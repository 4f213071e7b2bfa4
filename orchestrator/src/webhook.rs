//! Webhook receiver for provider payment notifications.
//!
//! Verifies the HMAC-SHA512 signature over the raw body before anything is
//! parsed, then settles `charge.success` events through the settlement
//! tracker. Amounts arrive in the currency's minor unit (kobo for NGN) and
//! are converted before crediting. Delivery is at-least-once; idempotency is
//! the tracker's job, so replays are acknowledged without re-crediting.

use std::collections::HashMap;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use tracing::{info, instrument, warn};

use walletcore_common::{Currency, ExternalReference, Money, Result, WalletError};
use walletcore_ledger::{SettlementOutcome, SettlementTracker};

use crate::config::WebhookConfig;
use crate::directory::RecipientDirectory;

type HmacSha512 = Hmac<Sha512>;

/// A parsed provider payment event.
#[derive(Debug, Clone, Deserialize)]
pub struct DepositEvent {
    /// Event type; only `charge.success` settles.
    pub event: String,
    /// Event payload.
    pub data: DepositData,
}

/// Payment details carried by a deposit event.
#[derive(Debug, Clone, Deserialize)]
pub struct DepositData {
    /// Provider reference for the payment.
    pub reference: String,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    /// The paying customer.
    pub customer: CustomerIdentity,
}

/// Customer identity attached to a payment event.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerIdentity {
    /// Customer email, resolved to an account through the directory.
    pub email: String,
}

/// What the receiver did with a delivery.
#[derive(Debug, Clone)]
pub enum WebhookDisposition {
    /// The event was settled (or found already settled).
    Settled(SettlementOutcome),
    /// The event type does not move money and was acknowledged.
    Ignored { event: String },
}

/// Verifies webhook signatures against the shared secret.
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl WebhookVerifier {
    /// Create a verifier from configuration.
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            secret: config.secret.as_bytes().to_vec(),
        }
    }

    /// Verify a hex-encoded HMAC-SHA512 signature over the raw body.
    pub fn verify(&self, body: &[u8], signature_hex: &str) -> Result<()> {
        let mut mac = HmacSha512::new_from_slice(&self.secret)
            .map_err(|_| WalletError::ConfigurationError("Unusable webhook secret".to_string()))?;
        mac.update(body);

        let signature = decode_hex(signature_hex).ok_or(WalletError::InvalidSignature)?;
        mac.verify_slice(&signature)
            .map_err(|_| WalletError::InvalidSignature)
    }
}

/// Receives provider payment webhooks and settles successful charges.
pub struct WebhookReceiver {
    verifier: WebhookVerifier,
    tracker: SettlementTracker,
    directory: Arc<RecipientDirectory>,
    currency: Currency,
    signature_header: String,
}

impl WebhookReceiver {
    /// Create a receiver.
    pub fn new(
        config: &WebhookConfig,
        tracker: SettlementTracker,
        directory: Arc<RecipientDirectory>,
        currency: Currency,
    ) -> Self {
        Self {
            verifier: WebhookVerifier::new(config),
            tracker,
            directory,
            currency,
            signature_header: config.signature_header.clone(),
        }
    }

    /// The header name the transport should read the signature from.
    pub fn signature_header(&self) -> &str {
        &self.signature_header
    }

    /// Process a delivery given its raw headers. Header names match
    /// case-insensitively; a delivery without the signature header is
    /// rejected outright.
    pub fn process_delivery(
        &self,
        body: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<WebhookDisposition> {
        let signature = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.signature_header))
            .map(|(_, value)| value.as_str())
            .ok_or(WalletError::InvalidSignature)?;
        self.process(body, signature)
    }

    /// Process one webhook delivery.
    ///
    /// The signature is checked before the body is parsed. Identity
    /// resolution happens before the settlement's atomic unit begins, so the
    /// tracker only ever sees an account id.
    #[instrument(skip(self, body, signature))]
    pub fn process(&self, body: &[u8], signature: &str) -> Result<WebhookDisposition> {
        self.verifier.verify(body, signature).map_err(|e| {
            warn!("Webhook rejected: invalid signature");
            e
        })?;

        let event: DepositEvent =
            serde_json::from_slice(body).map_err(|e| WalletError::InvalidRequest {
                message: format!("Malformed webhook body: {e}"),
                field: None,
            })?;

        if event.event != "charge.success" {
            info!(event = %event.event, "Webhook event ignored");
            return Ok(WebhookDisposition::Ignored { event: event.event });
        }

        let account_id = self.directory.resolve(&event.data.customer.email)?;
        let amount = Money::from_minor_units(event.data.amount, self.currency.clone());
        let reference = ExternalReference::new(event.data.reference);

        let outcome = self.tracker.settle(account_id, reference, amount)?;
        Ok(WebhookDisposition::Settled(outcome))
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use walletcore_common::AccountId;
    use walletcore_ledger::{LedgerEngine, LedgerStore};

    const SECRET: &str = "whsec_test_secret";

    fn sign(body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    fn receiver() -> (WebhookReceiver, Arc<LedgerStore>, AccountId) {
        let store = Arc::new(LedgerStore::new());
        let engine = LedgerEngine::new(store.clone());
        let account = store.open_account("ada@example.com", "Ada", Currency::ngn());
        let directory = Arc::new(RecipientDirectory::new());
        directory.register("ada@example.com", account.id);

        let config = WebhookConfig {
            secret: SECRET.to_string(),
            ..WebhookConfig::default()
        };
        let receiver = WebhookReceiver::new(
            &config,
            SettlementTracker::new(engine),
            directory,
            Currency::ngn(),
        );
        (receiver, store, account.id)
    }

    fn charge_success(reference: &str, amount_kobo: i64, email: &str) -> Vec<u8> {
        serde_json::json!({
            "event": "charge.success",
            "data": {
                "reference": reference,
                "amount": amount_kobo,
                "customer": { "email": email }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_valid_event_settles_in_major_units() {
        let (receiver, store, account) = receiver();
        let body = charge_success("psk_evt_100", 50_000, "ada@example.com");

        let disposition = receiver.process(&body, &sign(&body)).unwrap();
        assert!(matches!(
            disposition,
            WebhookDisposition::Settled(SettlementOutcome { applied: true, .. })
        ));
        // 50,000 kobo is 500.00 naira
        assert_eq!(store.account(&account).unwrap().balance, dec!(500.00));
    }

    #[test]
    fn test_replayed_delivery_credits_once() {
        let (receiver, store, account) = receiver();
        let body = charge_success("psk_evt_200", 25_000, "ada@example.com");
        let signature = sign(&body);

        receiver.process(&body, &signature).unwrap();
        let second = receiver.process(&body, &signature).unwrap();

        assert!(matches!(
            second,
            WebhookDisposition::Settled(SettlementOutcome { applied: false, .. })
        ));
        assert_eq!(store.account(&account).unwrap().balance, dec!(250.00));
    }

    #[test]
    fn test_bad_signature_rejected_before_parsing() {
        let (receiver, store, account) = receiver();
        let body = charge_success("psk_evt_300", 10_000, "ada@example.com");

        let err = receiver.process(&body, "deadbeef").unwrap_err();
        assert!(matches!(err, WalletError::InvalidSignature));
        assert_eq!(store.account(&account).unwrap().balance, dec!(0));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let (receiver, _, _) = receiver();
        let body = charge_success("psk_evt_400", 10_000, "ada@example.com");
        let signature = sign(&body);
        let tampered = charge_success("psk_evt_400", 99_999_999, "ada@example.com");

        let err = receiver.process(&tampered, &signature).unwrap_err();
        assert!(matches!(err, WalletError::InvalidSignature));
    }

    #[test]
    fn test_other_events_acknowledged_and_ignored() {
        let (receiver, store, account) = receiver();
        let body = serde_json::json!({
            "event": "transfer.success",
            "data": {
                "reference": "psk_evt_500",
                "amount": 10_000,
                "customer": { "email": "ada@example.com" }
            }
        })
        .to_string()
        .into_bytes();

        let disposition = receiver.process(&body, &sign(&body)).unwrap();
        assert!(matches!(disposition, WebhookDisposition::Ignored { .. }));
        assert_eq!(store.account(&account).unwrap().balance, dec!(0));
    }

    #[test]
    fn test_delivery_reads_configured_header_case_insensitively() {
        let (receiver, store, account) = receiver();
        let body = charge_success("psk_evt_700", 20_000, "ada@example.com");

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("X-Paystack-Signature".to_string(), sign(&body));

        assert_eq!(receiver.signature_header(), "x-paystack-signature");
        let disposition = receiver.process_delivery(&body, &headers).unwrap();
        assert!(matches!(disposition, WebhookDisposition::Settled(_)));
        assert_eq!(store.account(&account).unwrap().balance, dec!(200.00));
    }

    #[test]
    fn test_delivery_without_signature_header_rejected() {
        let (receiver, store, account) = receiver();
        let body = charge_success("psk_evt_800", 20_000, "ada@example.com");

        let headers = HashMap::new();
        let err = receiver.process_delivery(&body, &headers).unwrap_err();
        assert!(matches!(err, WalletError::InvalidSignature));
        assert_eq!(store.account(&account).unwrap().balance, dec!(0));
    }

    #[test]
    fn test_unknown_customer_not_settled() {
        let (receiver, _, _) = receiver();
        let body = charge_success("psk_evt_600", 10_000, "ghost@example.com");

        let err = receiver.process(&body, &sign(&body)).unwrap_err();
        assert!(matches!(err, WalletError::RecipientNotFound(_)));
    }
}
