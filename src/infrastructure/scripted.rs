//! Deterministic playback doubles for the gateway and the confirmation
//! relay. Used by the integration tests and the simulator binary; delays are
//! tokio timers, so paused-clock tests run them instantly.

use crate::domain::payment::{AccountReference, Amount, ChannelMessage, CorrelationId, Msisdn};
use crate::domain::ports::{
    ChannelConnector, ChargeAck, ConfirmationChannel, ConfirmationChannelBox, PaymentGateway,
};
use crate::error::{ChannelError, GatewayError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the scripted gateway answers the initiation call.
#[derive(Debug, Clone)]
pub enum GatewayResponse {
    Ack {
        correlation_id: Option<CorrelationId>,
    },
    Reject {
        reason: String,
    },
    Unreachable {
        detail: String,
    },
    /// Never answers; exercises the initiation timeout.
    Silent,
}

pub struct ScriptedGateway {
    response: GatewayResponse,
    delay: Duration,
}

impl ScriptedGateway {
    pub fn new(response: GatewayResponse) -> Self {
        Self {
            response,
            delay: Duration::ZERO,
        }
    }

    /// Gateway that acks with the given checkout id.
    pub fn acking(id: &str) -> Self {
        Self::new(GatewayResponse::Ack {
            correlation_id: Some(CorrelationId::new(id)),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate_charge(
        &self,
        _amount: Amount,
        _payer: &Msisdn,
        _reference: &AccountReference,
    ) -> Result<ChargeAck, GatewayError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.response.clone() {
            GatewayResponse::Ack { correlation_id } => Ok(ChargeAck {
                correlation_id,
                customer_message: Some("Success. Request accepted for processing".to_string()),
            }),
            GatewayResponse::Reject { reason } => Err(GatewayError::Rejected { reason }),
            GatewayResponse::Unreachable { detail } => Err(GatewayError::Unreachable { detail }),
            GatewayResponse::Silent => std::future::pending().await,
        }
    }
}

/// One step of a scripted connection.
#[derive(Debug, Clone)]
pub enum ChannelStep {
    /// Deliver a frame after the given delay.
    Deliver {
        after: Duration,
        message: ChannelMessage,
    },
    /// Close the connection after the given delay.
    Close { after: Duration },
}

impl ChannelStep {
    pub fn deliver(message: ChannelMessage) -> Self {
        Self::Deliver {
            after: Duration::ZERO,
            message,
        }
    }

    pub fn deliver_after(after: Duration, message: ChannelMessage) -> Self {
        Self::Deliver { after, message }
    }

    pub fn close_after(after: Duration) -> Self {
        Self::Close { after }
    }
}

/// The steps one connection will play. When they run out the connection
/// stays open and silent.
pub type ConnectionScript = Vec<ChannelStep>;

pub type SubscriptionLog = Arc<Mutex<Vec<CorrelationId>>>;

/// Hands out one scripted connection per `connect` call, in order. Once the
/// scripts run out, further dials are refused, which is what a downed relay
/// looks like to the reconciler.
pub struct ScriptedConnector {
    connections: Arc<Mutex<VecDeque<ConnectionScript>>>,
    subscriptions: SubscriptionLog,
}

impl ScriptedConnector {
    pub fn new(connections: Vec<ConnectionScript>) -> Self {
        Self {
            connections: Arc::new(Mutex::new(connections.into())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared log of every id subscribed across all connections; clone it
    /// before handing the connector to the reconciler.
    pub fn subscription_log(&self) -> SubscriptionLog {
        Arc::clone(&self.subscriptions)
    }
}

#[async_trait]
impl ChannelConnector for ScriptedConnector {
    async fn connect(&self) -> Result<ConfirmationChannelBox, ChannelError> {
        let script = self
            .connections
            .lock()
            .map_err(|_| ChannelError::new("connection script poisoned"))?
            .pop_front();
        match script {
            Some(steps) => Ok(Box::new(ScriptedChannel {
                steps: steps.into(),
                subscriptions: Arc::clone(&self.subscriptions),
            })),
            None => Err(ChannelError::new("relay refused the connection")),
        }
    }
}

pub struct ScriptedChannel {
    steps: VecDeque<ChannelStep>,
    subscriptions: SubscriptionLog,
}

#[async_trait]
impl ConfirmationChannel for ScriptedChannel {
    async fn subscribe(&mut self, id: &CorrelationId) -> Result<(), ChannelError> {
        self.subscriptions
            .lock()
            .map_err(|_| ChannelError::new("subscription log poisoned"))?
            .push(id.clone());
        Ok(())
    }

    async fn next_message(&mut self) -> Option<ChannelMessage> {
        match self.steps.pop_front() {
            Some(ChannelStep::Deliver { after, message }) => {
                if !after.is_zero() {
                    tokio::time::sleep(after).await;
                }
                Some(message)
            }
            Some(ChannelStep::Close { after }) => {
                if !after.is_zero() {
                    tokio::time::sleep(after).await;
                }
                None
            }
            None => std::future::pending().await,
        }
    }
}
