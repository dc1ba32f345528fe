use thiserror::Error;

/// Terminal failure taxonomy for a reconciliation attempt.
///
/// Every attempt ends in a confirmed booking or exactly one of these; the
/// `Display` text is the message shown to the paying user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileFailure {
    #[error("payment gateway rejected the charge: {reason}")]
    GatewayRejected { reason: String },
    #[error("could not reach the payment gateway: {detail}")]
    InitiationUnreachable { detail: String },
    #[error("payment declined: {reason}")]
    PaymentDeclined { reason: String },
    #[error(
        "no confirmation arrived in time; check your M-PESA messages, the charge may still have gone through"
    )]
    ConfirmationTimeout,
    #[error("the domain was booked by someone else while the payment was processing")]
    DomainNoLongerAvailable,
    #[error("payment went through but the booking could not be recorded: {detail}")]
    PersistenceFailed { detail: String },
    #[error("booking attempt cancelled before the payment resolved")]
    Abandoned,
}

impl ReconcileFailure {
    /// `PersistenceFailed` means money moved without a booking record.
    /// Callers must surface it distinctly; there is no automatic refund path.
    pub fn requires_manual_reconciliation(&self) -> bool {
        matches!(self, Self::PersistenceFailed { .. })
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway rejected the request: {reason}")]
    Rejected { reason: String },
    #[error("gateway unreachable: {detail}")]
    Unreachable { detail: String },
}

#[derive(Error, Debug)]
#[error("confirmation channel error: {detail}")]
pub struct ChannelError {
    detail: String,
}

impl ChannelError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("domain already has an active booking")]
    AlreadyBooked,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected `Amount`/`Msisdn`/`DomainName` input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
