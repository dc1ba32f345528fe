//! WebSocket adapter for the payment confirmation relay.
//!
//! The relay broadcasts Daraja callback results as JSON text frames. A
//! connection announces interest in one checkout id after connecting;
//! everything unparseable or unrelated is ignored rather than treated as an
//! error, since the stream is shared.

use crate::domain::payment::{ChannelMessage, CorrelationId};
use crate::domain::ports::{ChannelConnector, ConfirmationChannel, ConfirmationChannelBox};
use crate::error::ChannelError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Dials the relay URL. Hand one of these to the reconciler and it redials
/// through it on every reconnect.
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn connect(&self) -> Result<ConfirmationChannelBox, ChannelError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::new(format!("connect to {}: {e}", self.url)))?;
        Ok(Box::new(WebSocketChannel { stream }))
    }
}

pub struct WebSocketChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

/// Relay frame as broadcast to all listeners. Unknown fields are ignored.
#[derive(Deserialize)]
struct RelayFrame {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode")]
    result_code: Option<i32>,
    #[serde(rename = "ResultDesc")]
    result_desc: Option<String>,
}

impl From<RelayFrame> for ChannelMessage {
    fn from(frame: RelayFrame) -> Self {
        Self {
            correlation_id: frame.checkout_request_id.map(CorrelationId::new),
            result_code: frame.result_code,
            reason: frame.result_desc,
        }
    }
}

#[async_trait]
impl ConfirmationChannel for WebSocketChannel {
    async fn subscribe(&mut self, id: &CorrelationId) -> Result<(), ChannelError> {
        let frame = serde_json::json!({
            "action": "subscribe",
            "CheckoutRequestID": id.as_str(),
        });
        self.stream
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| ChannelError::new(format!("subscribe: {e}")))
    }

    async fn next_message(&mut self) -> Option<ChannelMessage> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str::<RelayFrame>(&text) {
                    Ok(frame) => return Some(frame.into()),
                    Err(err) => {
                        tracing::debug!(error = %err, "unparseable relay frame ignored");
                    }
                },
                Ok(Message::Ping(payload)) => {
                    if self.stream.send(Message::Pong(payload)).await.is_err() {
                        return None;
                    }
                }
                Ok(Message::Close(_)) => return None,
                // Binary and pong frames are not relay traffic.
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "relay read error, treating as closed");
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_frame_parsing() {
        let msg: ChannelMessage = serde_json::from_str::<RelayFrame>(
            r#"{"CheckoutRequestID":"ws_CO_1","ResultCode":0,"ResultDesc":"Success","extra":true}"#,
        )
        .unwrap()
        .into();
        assert_eq!(msg.correlation_id, Some(CorrelationId::new("ws_CO_1")));
        assert_eq!(msg.result_code, Some(0));

        let keepalive: ChannelMessage =
            serde_json::from_str::<RelayFrame>(r#"{"ping":1}"#).unwrap().into();
        assert_eq!(keepalive.correlation_id, None);
        assert_eq!(keepalive.result_code, None);
    }
}
