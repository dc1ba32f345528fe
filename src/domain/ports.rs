use super::booking::{BookingRecord, DomainName};
use super::payment::{AccountReference, Amount, ChannelMessage, CorrelationId, Msisdn};
use crate::error::{ChannelError, GatewayError, PersistError};
use async_trait::async_trait;
use std::io;

/// Gateway acknowledgement of a charge initiation.
///
/// A missing correlation id means the gateway accepted the HTTP call but did
/// not open a checkout; the reconciler treats that as a rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeAck {
    pub correlation_id: Option<CorrelationId>,
    pub customer_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_charge(
        &self,
        amount: Amount,
        payer: &Msisdn,
        reference: &AccountReference,
    ) -> Result<ChargeAck, GatewayError>;
}

/// One live connection to the confirmation relay.
#[async_trait]
pub trait ConfirmationChannel: Send {
    /// Announce interest in a checkout. Sent once per connection and must be
    /// re-sent after every reconnect.
    async fn subscribe(&mut self, id: &CorrelationId) -> Result<(), ChannelError>;

    /// Next inbound frame; `None` means the connection closed.
    async fn next_message(&mut self) -> Option<ChannelMessage>;
}

/// Dials the relay. The reconciler redials through this on every reconnect.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self) -> Result<ConfirmationChannelBox, ChannelError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Advisory pre-check; `persist_booking`'s rejection is the authority.
    async fn check_availability(&self, domain: &DomainName) -> io::Result<Availability>;

    /// Authoritative, uniqueness-enforcing write: at most one active booking
    /// per domain.
    async fn persist_booking(&self, booking: BookingRecord) -> Result<(), PersistError>;

    async fn active_bookings(&self) -> io::Result<Vec<BookingRecord>>;
}

pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
pub type ConfirmationChannelBox = Box<dyn ConfirmationChannel>;
pub type ChannelConnectorBox = Box<dyn ChannelConnector>;
pub type BookingStoreBox = Box<dyn BookingStore>;
