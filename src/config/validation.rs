//! Semantic validation of loaded configuration.
//!
//! Serde handles syntax; this module checks that the values make sense
//! together. Every violation is collected so one run reports all of them.

use alloy::primitives::Address;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RelayConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.blockchain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new(
            "blockchain.rpc_url",
            format!("'{}' is not a valid URL", config.blockchain.rpc_url),
        ));
    }
    for failover in &config.blockchain.failover_urls {
        if failover.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                "blockchain.failover_urls",
                format!("'{}' is not a valid URL", failover),
            ));
        }
    }
    if config.blockchain.chain_id == 0 {
        errors.push(ValidationError::new("blockchain.chain_id", "must be non-zero"));
    }
    if config.blockchain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "blockchain.rpc_timeout_secs",
            "must be at least 1",
        ));
    }

    if config.contract.address.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "contract.address",
            format!("'{}' is not a valid address", config.contract.address),
        ));
    }

    let submission = &config.submission;
    if submission.max_attempts == 0 {
        errors.push(ValidationError::new(
            "submission.max_attempts",
            "must be at least 1",
        ));
    }
    if submission.base_fee_multiplier == 0 {
        errors.push(ValidationError::new(
            "submission.base_fee_multiplier",
            "must be at least 1",
        ));
    }
    if submission.max_fee_cap_gwei == 0 {
        errors.push(ValidationError::new(
            "submission.max_fee_cap_gwei",
            "must be non-zero",
        ));
    }
    if submission.receipt_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "submission.receipt_poll_interval_ms",
            "must be non-zero",
        ));
    }
    if submission.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "submission.confirmation_timeout_secs",
            "must be non-zero",
        ));
    }
    if submission.retry_base_delay_ms > submission.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "submission.retry_base_delay_ms",
            "must not exceed retry_max_delay_ms",
        ));
    }

    if config.funding.min_balance_gwei == 0 {
        errors.push(ValidationError::new(
            "funding.min_balance_gwei",
            "must be non-zero",
        ));
    }

    if let Some(address) = &config.observability.metrics_address {
        if address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("'{}' is not a socket address", address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
