use crate::application::config::ReconcilerConfig;
use crate::application::machine::{AttemptEvent, AttemptMachine, Effect};
use crate::domain::booking::{BookingRecord, DomainName, OwnerId};
use crate::domain::payment::{AccountReference, Amount, CorrelationId, Msisdn, PaymentRequest};
use crate::domain::ports::{
    Availability, BookingStoreBox, ChannelConnectorBox, ConfirmationChannelBox, PaymentGatewayBox,
};
use crate::error::{GatewayError, PersistError, ReconcileFailure};
use chrono::Utc;
use std::io;
use tokio::sync::oneshot;
use tokio::time;

/// What the caller wants booked and charged.
#[derive(Debug, Clone)]
pub struct BookingOrder {
    pub domain: DomainName,
    pub owner: OwnerId,
    pub amount: Amount,
    pub payer: Msisdn,
}

/// Final word on one attempt: the request with its terminal status, and
/// either the booking or the failure to show the user.
#[derive(Debug)]
pub struct ReconcileReport {
    pub request: PaymentRequest,
    pub outcome: Result<BookingRecord, ReconcileFailure>,
}

/// Coordinates one payment attempt end to end: STK-push initiation,
/// confirmation over the relay, and the exactly-once booking commit.
///
/// Owns the collaborator ports and drives the [`AttemptMachine`]; all
/// decisions live in the machine, all I/O lives here.
pub struct PaymentReconciler {
    gateway: PaymentGatewayBox,
    connector: ChannelConnectorBox,
    store: BookingStoreBox,
    config: ReconcilerConfig,
}

impl PaymentReconciler {
    pub fn new(
        gateway: PaymentGatewayBox,
        connector: ChannelConnectorBox,
        store: BookingStoreBox,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            gateway,
            connector,
            store,
            config,
        }
    }

    /// Runs one reconciliation attempt to a terminal state.
    ///
    /// The caller keeps the sender side of `cancel` alive for as long as it
    /// wants the attempt to run; sending on it, or dropping it (the owning
    /// screen was torn down), abandons the attempt. An in-flight charge is
    /// never cancelled at the gateway; once the payer enters their PIN the
    /// money may move regardless.
    pub async fn reconcile(
        &self,
        order: BookingOrder,
        mut cancel: oneshot::Receiver<()>,
    ) -> ReconcileReport {
        let reference = AccountReference::generate(&order.domain, Utc::now());
        let request = PaymentRequest::new(order.amount, order.payer.clone(), reference.clone());
        let mut machine = AttemptMachine::new(request);

        tracing::info!(
            domain = %order.domain,
            amount = order.amount.value(),
            payer = %order.payer,
            "initiating STK push"
        );
        let initiation = time::timeout(
            self.config.initiation_timeout,
            self.gateway
                .initiate_charge(order.amount, &order.payer, &reference),
        );
        let event = tokio::select! {
            _ = &mut cancel => AttemptEvent::Cancelled,
            outcome = initiation => match outcome {
                Ok(Ok(ack)) => match ack.correlation_id {
                    Some(correlation_id) => AttemptEvent::ChargeAccepted { correlation_id },
                    None => AttemptEvent::ChargeRejected {
                        reason: "gateway returned no checkout id".to_string(),
                    },
                },
                Ok(Err(GatewayError::Rejected { reason })) => {
                    AttemptEvent::ChargeRejected { reason }
                }
                Ok(Err(GatewayError::Unreachable { detail })) => {
                    AttemptEvent::ChargeUnreachable { detail }
                }
                Err(_) => AttemptEvent::ChargeUnreachable {
                    detail: format!(
                        "no gateway response within {:?}",
                        self.config.initiation_timeout
                    ),
                },
            },
        };

        let correlation_id = match &event {
            AttemptEvent::ChargeAccepted { correlation_id } => Some(correlation_id.clone()),
            _ => None,
        };

        if machine.apply(event) != Effect::Done
            && let Some(correlation_id) = correlation_id
        {
            self.await_confirmation(&mut machine, correlation_id, &order, &mut cancel)
                .await;
        }

        self.close(machine)
    }

    /// Consumes the reconciler and returns the currently active bookings.
    pub async fn into_results(self) -> io::Result<Vec<BookingRecord>> {
        self.store.active_bookings().await
    }

    async fn await_confirmation(
        &self,
        machine: &mut AttemptMachine,
        correlation_id: CorrelationId,
        order: &BookingOrder,
        cancel: &mut oneshot::Receiver<()>,
    ) {
        let deadline = time::sleep(self.config.confirmation_timeout);
        tokio::pin!(deadline);
        let mut backoff = self.config.reconnect_base_delay;

        'session: loop {
            // Dial (and redial) until subscribed, the window closes, or the
            // caller walks away.
            let mut channel = loop {
                let dialed = tokio::select! {
                    _ = &mut *cancel => {
                        machine.apply(AttemptEvent::Cancelled);
                        return;
                    }
                    () = &mut deadline => {
                        machine.apply(AttemptEvent::DeadlineElapsed);
                        return;
                    }
                    dialed = self.connect_and_subscribe(&correlation_id) => dialed,
                };
                match dialed {
                    Ok(channel) => {
                        backoff = self.config.reconnect_base_delay;
                        break channel;
                    }
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            delay_ms = backoff.as_millis() as u64,
                            "confirmation channel unavailable, backing off"
                        );
                        tokio::select! {
                            _ = &mut *cancel => {
                                machine.apply(AttemptEvent::Cancelled);
                                return;
                            }
                            () = &mut deadline => {
                                machine.apply(AttemptEvent::DeadlineElapsed);
                                return;
                            }
                            () = time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(self.config.reconnect_max_delay);
                    }
                }
            };

            // Read frames off this connection.
            loop {
                let event = tokio::select! {
                    _ = &mut *cancel => AttemptEvent::Cancelled,
                    () = &mut deadline => AttemptEvent::DeadlineElapsed,
                    msg = channel.next_message() => match msg {
                        Some(msg) => AttemptEvent::Message(msg),
                        None => AttemptEvent::ChannelClosed,
                    },
                };
                match machine.apply(event) {
                    Effect::Continue => {}
                    Effect::Done => return,
                    Effect::Commit => {
                        // Dropping the channel releases the subscription; the
                        // commit runs to completion regardless of the deadline
                        // or the caller.
                        drop(channel);
                        let event = self.run_commit(machine.request(), order).await;
                        machine.apply(event);
                        return;
                    }
                    Effect::Reconnect => {
                        tracing::warn!(
                            checkout = %correlation_id,
                            delay_ms = backoff.as_millis() as u64,
                            "confirmation channel dropped, reconnecting"
                        );
                        drop(channel);
                        tokio::select! {
                            _ = &mut *cancel => {
                                machine.apply(AttemptEvent::Cancelled);
                                return;
                            }
                            () = &mut deadline => {
                                machine.apply(AttemptEvent::DeadlineElapsed);
                                return;
                            }
                            () = time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(self.config.reconnect_max_delay);
                        continue 'session;
                    }
                }
            }
        }
    }

    async fn connect_and_subscribe(
        &self,
        id: &CorrelationId,
    ) -> Result<ConfirmationChannelBox, crate::error::ChannelError> {
        let mut channel = self.connector.connect().await?;
        channel.subscribe(id).await?;
        tracing::debug!(checkout = %id, "subscribed to confirmation channel");
        Ok(channel)
    }

    async fn run_commit(&self, request: &PaymentRequest, order: &BookingOrder) -> AttemptEvent {
        // Close the race between search time and confirmation time: someone
        // else may have booked the domain while the payer typed their PIN.
        match self.store.check_availability(&order.domain).await {
            Ok(Availability::Unavailable) => return AttemptEvent::DomainTaken,
            Ok(Availability::Available) => {}
            Err(err) => {
                // Advisory read; the uniqueness rejection below is the authority.
                tracing::warn!(error = %err, "availability re-check failed, deferring to the store");
            }
        }

        let booking = BookingRecord::new(
            order.domain.clone(),
            order.owner.clone(),
            Utc::now(),
            self.config.booking_validity,
        );

        let attempts = self.config.persist_attempts.max(1);
        let mut delay = self.config.persist_retry_delay;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.store.persist_booking(booking.clone()).await {
                Ok(()) => return AttemptEvent::BookingPersisted(booking),
                Err(PersistError::AlreadyBooked) => return AttemptEvent::DomainTaken,
                Err(PersistError::Io(err)) => {
                    tracing::warn!(attempt, error = %err, "booking write failed");
                    last_error = err.to_string();
                    if attempt < attempts {
                        time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        // Money has moved but nothing was recorded; nothing downstream can
        // repair this automatically.
        tracing::error!(
            domain = %order.domain,
            checkout = ?request.correlation_id,
            reference = %request.account_reference,
            error = %last_error,
            "charge succeeded but booking was not recorded; manual reconciliation required"
        );
        AttemptEvent::PersistExhausted { detail: last_error }
    }

    fn close(&self, machine: AttemptMachine) -> ReconcileReport {
        let (request, outcome) = machine.into_parts();
        let outcome = outcome.unwrap_or(Err(ReconcileFailure::Abandoned));
        match &outcome {
            Ok(booking) => {
                tracing::info!(
                    domain = %booking.domain_name,
                    expires = %booking.expires_at,
                    "booking confirmed"
                );
            }
            Err(failure) => {
                tracing::info!(status = ?request.status, %failure, "attempt closed without a booking");
            }
        }
        ReconcileReport { request, outcome }
    }
}
