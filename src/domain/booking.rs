use crate::error::ValidationError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registrable `.ke` name, stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainName(String);

impl DomainName {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let name = input.trim().to_ascii_lowercase();

        if !name.ends_with(".ke") {
            return Err(ValidationError(format!(
                "only .ke domains can be booked, got {input:?}"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(ValidationError(format!(
                "domain contains invalid characters: {input:?}"
            )));
        }
        if name
            .split('.')
            .any(|label| label.is_empty() || label.starts_with('-') || label.ends_with('-'))
        {
            return Err(ValidationError(format!("malformed domain name: {input:?}")));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the account that owns a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A paid reservation of a domain.
///
/// Created exactly once per confirmed payment, never speculatively.
/// `expires_at` is always derived from `booked_at`; callers never set it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub domain_name: DomainName,
    pub owner_id: OwnerId,
    pub booked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BookingRecord {
    pub fn new(
        domain_name: DomainName,
        owner_id: OwnerId,
        booked_at: DateTime<Utc>,
        validity: TimeDelta,
    ) -> Self {
        Self {
            domain_name,
            owner_id,
            booked_at,
            expires_at: booked_at + validity,
        }
    }

    /// An expired booking no longer reserves the domain.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
