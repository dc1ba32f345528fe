use crate::domain::booking::BookingRecord;
use crate::domain::payment::{ChannelMessage, CorrelationId, PaymentRequest, PaymentStatus};
use crate::error::ReconcileFailure;

/// Everything that can happen to an attempt, from whichever source.
#[derive(Debug)]
pub enum AttemptEvent {
    ChargeAccepted { correlation_id: CorrelationId },
    ChargeRejected { reason: String },
    ChargeUnreachable { detail: String },
    Message(ChannelMessage),
    ChannelClosed,
    DeadlineElapsed,
    Cancelled,
    BookingPersisted(BookingRecord),
    DomainTaken,
    PersistExhausted { detail: String },
}

/// What the driver must do after a transition.
#[derive(Debug, PartialEq, Eq)]
pub enum Effect {
    /// Keep waiting.
    Continue,
    /// Channel dropped mid-wait: back off, reconnect, re-subscribe.
    Reconnect,
    /// A matching success frame was accepted: run the commit protocol.
    Commit,
    /// The attempt reached a terminal state.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initiating,
    Awaiting,
    Committing,
    Terminal,
}

/// Per-attempt state machine.
///
/// Every mutation of an attempt funnels through [`AttemptMachine::apply`];
/// the terminal check at its top is the single enforcement point of the
/// ignore-after-terminal rule, which is what makes the attempt safe under
/// at-least-once frame delivery and late frames after abandonment.
pub struct AttemptMachine {
    request: PaymentRequest,
    phase: Phase,
    outcome: Option<Result<BookingRecord, ReconcileFailure>>,
}

impl AttemptMachine {
    pub fn new(request: PaymentRequest) -> Self {
        Self {
            request,
            phase: Phase::Initiating,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::Terminal
    }

    pub fn request(&self) -> &PaymentRequest {
        &self.request
    }

    pub fn outcome(&self) -> Option<&Result<BookingRecord, ReconcileFailure>> {
        self.outcome.as_ref()
    }

    pub fn into_parts(self) -> (PaymentRequest, Option<Result<BookingRecord, ReconcileFailure>>) {
        (self.request, self.outcome)
    }

    pub fn apply(&mut self, event: AttemptEvent) -> Effect {
        if self.is_terminal() {
            tracing::debug!(?event, "event after terminal state ignored");
            return Effect::Done;
        }

        match (self.phase, event) {
            (Phase::Initiating, AttemptEvent::ChargeAccepted { correlation_id }) => {
                tracing::info!(checkout = %correlation_id, "charge initiated, awaiting confirmation");
                self.request.correlation_id = Some(correlation_id);
                self.phase = Phase::Awaiting;
                Effect::Continue
            }
            (Phase::Initiating, AttemptEvent::ChargeRejected { reason }) => {
                self.fail(ReconcileFailure::GatewayRejected { reason })
            }
            (Phase::Initiating, AttemptEvent::ChargeUnreachable { detail }) => {
                self.fail(ReconcileFailure::InitiationUnreachable { detail })
            }
            (Phase::Awaiting, AttemptEvent::Message(msg)) => self.on_message(msg),
            (Phase::Awaiting, AttemptEvent::ChannelClosed) => Effect::Reconnect,
            (Phase::Awaiting, AttemptEvent::DeadlineElapsed) => {
                self.request.status = PaymentStatus::TimedOut;
                self.finish(Err(ReconcileFailure::ConfirmationTimeout))
            }
            (Phase::Initiating, AttemptEvent::Cancelled)
            | (Phase::Awaiting, AttemptEvent::Cancelled) => {
                self.request.status = PaymentStatus::Abandoned;
                self.finish(Err(ReconcileFailure::Abandoned))
            }
            (Phase::Committing, AttemptEvent::BookingPersisted(booking)) => {
                self.request.status = PaymentStatus::Confirmed;
                self.finish(Ok(booking))
            }
            (Phase::Committing, AttemptEvent::DomainTaken) => {
                self.fail(ReconcileFailure::DomainNoLongerAvailable)
            }
            (Phase::Committing, AttemptEvent::PersistExhausted { detail }) => {
                self.fail(ReconcileFailure::PersistenceFailed { detail })
            }
            // A duplicate frame, a dropped channel, the overall deadline or a
            // cancellation cannot unseat an accepted success frame.
            (Phase::Committing, _) => Effect::Continue,
            (_, _) => Effect::Continue,
        }
    }

    fn on_message(&mut self, msg: ChannelMessage) -> Effect {
        if msg.correlation_id.as_ref() != self.request.correlation_id.as_ref() {
            tracing::debug!(frame = ?msg.correlation_id, "frame for another checkout ignored");
            return Effect::Continue;
        }
        match msg.result_code {
            // Ack or keepalive frame, not a result.
            None => Effect::Continue,
            Some(0) => {
                self.phase = Phase::Committing;
                Effect::Commit
            }
            Some(code) => {
                let reason = msg
                    .reason
                    .unwrap_or_else(|| format!("gateway result code {code}"));
                self.fail(ReconcileFailure::PaymentDeclined { reason })
            }
        }
    }

    fn fail(&mut self, failure: ReconcileFailure) -> Effect {
        self.request.status = PaymentStatus::Failed;
        self.finish(Err(failure))
    }

    fn finish(&mut self, outcome: Result<BookingRecord, ReconcileFailure>) -> Effect {
        self.phase = Phase::Terminal;
        self.outcome = Some(outcome);
        Effect::Done
    }
}
