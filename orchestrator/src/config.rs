//! Orchestrator configuration.

use std::time::Duration;

use walletcore_common::{Currency, Result, WalletError};

/// Provider call configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Timeout applied to each provider call.
    pub request_timeout: Duration,
    /// Narration carried on outbound payouts.
    pub payout_narration: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            payout_narration: "Wallet withdrawal".to_string(),
        }
    }
}

/// Webhook receiver configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared secret for signature verification.
    pub secret: String,
    /// Header carrying the hex-encoded signature.
    pub signature_header: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            signature_header: "x-paystack-signature".to_string(),
        }
    }
}

/// Main orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wallet currency for new accounts.
    pub default_currency: Currency,
    /// Provider call configuration.
    pub provider: ProviderConfig,
    /// Webhook receiver configuration.
    pub webhook: WebhookConfig,
    /// Log level.
    pub log_level: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_currency: Currency::ngn(),
            provider: ProviderConfig::default(),
            webhook: WebhookConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(currency) = std::env::var("WALLET_CURRENCY") {
            config.default_currency = Currency::new(currency);
        }

        if let Ok(secret) = std::env::var("WEBHOOK_SECRET") {
            config.webhook.secret = secret;
        }

        if let Ok(header) = std::env::var("WEBHOOK_SIGNATURE_HEADER") {
            config.webhook.signature_header = header;
        }

        if let Ok(timeout) = std::env::var("PROVIDER_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.provider.request_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.webhook.secret.is_empty() {
            return Err(WalletError::ConfigurationError(
                "Webhook secret cannot be empty".to_string(),
            ));
        }

        if self.webhook.signature_header.is_empty() {
            return Err(WalletError::ConfigurationError(
                "Webhook signature header cannot be empty".to_string(),
            ));
        }

        if self.provider.request_timeout.is_zero() {
            return Err(WalletError::ConfigurationError(
                "Provider timeout cannot be zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_needs_secret() {
        let mut config = OrchestratorConfig::default();
        assert!(config.validate().is_err());

        config.webhook.secret = "whsec_test".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = OrchestratorConfig::default();
        config.webhook.secret = "whsec_test".to_string();
        config.provider.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
