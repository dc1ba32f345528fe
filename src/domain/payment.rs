use crate::domain::booking::DomainName;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned by the payment gateway when a charge is
/// initiated. Later confirmation frames are matched back to the originating
/// request through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Charge amount in whole Kenyan shillings.
///
/// STK push takes whole units; zero is rejected at construction so a
/// malformed order can never reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub fn new(value: u64) -> Result<Self, ValidationError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(ValidationError("amount must be positive".to_string()))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = ValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Subscriber number in canonical form: digits only, `254`-prefixed.
///
/// Accepts the shapes users actually type (`07…`, `01…`, `+254…`, `254…`,
/// with spaces or dashes) and rejects everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msisdn(String);

impl Msisdn {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let digits = compact.strip_prefix('+').unwrap_or(&compact);

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError(format!(
                "phone number must be digits only, got {input:?}"
            )));
        }

        let canonical = if let Some(rest) = digits.strip_prefix("254") {
            if rest.len() != 9 {
                return Err(ValidationError(format!(
                    "expected 9 digits after the country code, got {input:?}"
                )));
            }
            digits.to_string()
        } else if let Some(rest) = digits.strip_prefix('0') {
            if rest.len() != 9 {
                return Err(ValidationError(format!(
                    "expected a 10-digit local number, got {input:?}"
                )));
            }
            format!("254{rest}")
        } else {
            return Err(ValidationError(format!(
                "unrecognized phone number format: {input:?}"
            )));
        };

        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Msisdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-side correlation label for a charge. Embeds the request time so
/// that retried attempts for the same domain stay distinguishable at the
/// gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReference(String);

impl AccountReference {
    pub fn generate(domain: &DomainName, at: DateTime<Utc>) -> Self {
        Self(format!("{}-{}", domain.as_str(), at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
    TimedOut,
    Abandoned,
}

impl PaymentStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One charge attempt as the reconciler tracks it.
///
/// Created when the user confirms intent to pay; `correlation_id` is filled
/// in once the gateway accepts the initiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub correlation_id: Option<CorrelationId>,
    pub amount: Amount,
    pub payer_phone: Msisdn,
    pub account_reference: AccountReference,
    pub status: PaymentStatus,
}

impl PaymentRequest {
    pub fn new(amount: Amount, payer_phone: Msisdn, account_reference: AccountReference) -> Self {
        Self {
            correlation_id: None,
            amount,
            payer_phone,
            account_reference,
            status: PaymentStatus::Pending,
        }
    }
}

/// Inbound frame from the confirmation channel.
///
/// The relay broadcasts frames for many checkouts; a frame may lack a
/// correlation id or a result code (acks, keepalives) and may be delivered
/// more than once. Result code 0 is success, anything else is a failure
/// with `reason` carrying the gateway-supplied text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub correlation_id: Option<CorrelationId>,
    pub result_code: Option<i32>,
    pub reason: Option<String>,
}

impl ChannelMessage {
    pub fn success(id: &str) -> Self {
        Self {
            correlation_id: Some(CorrelationId::new(id)),
            result_code: Some(0),
            reason: None,
        }
    }

    pub fn declined(id: &str, code: i32, reason: &str) -> Self {
        Self {
            correlation_id: Some(CorrelationId::new(id)),
            result_code: Some(code),
            reason: Some(reason.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(1).is_ok());
        assert!(Amount::new(0).is_err());
        assert_eq!(Amount::try_from(500).unwrap().value(), 500);
    }

    #[test]
    fn test_msisdn_normalization() {
        assert_eq!(Msisdn::parse("0712345678").unwrap().as_str(), "254712345678");
        assert_eq!(
            Msisdn::parse("+254 712 345 678").unwrap().as_str(),
            "254712345678"
        );
        assert_eq!(Msisdn::parse("254712345678").unwrap().as_str(), "254712345678");
        assert_eq!(Msisdn::parse("0112345678").unwrap().as_str(), "254112345678");
    }

    #[test]
    fn test_msisdn_rejects_garbage() {
        assert!(Msisdn::parse("").is_err());
        assert!(Msisdn::parse("07123").is_err());
        assert!(Msisdn::parse("0712345678901").is_err());
        assert!(Msisdn::parse("not-a-number").is_err());
        assert!(Msisdn::parse("44712345678").is_err());
    }

    #[test]
    fn test_account_reference_embeds_timestamp() {
        let domain = DomainName::parse("foo.co.ke").unwrap();
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let reference = AccountReference::generate(&domain, at);
        assert!(reference.as_str().starts_with("foo.co.ke-"));
        assert!(reference.as_str().ends_with(&at.timestamp_millis().to_string()));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Confirmed.is_terminal());
        assert!(PaymentStatus::Abandoned.is_terminal());
    }
}
