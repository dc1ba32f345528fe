//! Safaricom Daraja STK-push gateway adapter.
//!
//! Initiates a `CustomerPayBillOnline` charge against the Daraja API and
//! maps the returned `CheckoutRequestID` to the reconciler's correlation id.

use crate::domain::payment::{AccountReference, Amount, CorrelationId, Msisdn};
use crate::domain::ports::{ChargeAck, PaymentGateway};
use crate::error::GatewayError;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::Deserialize;

/// Connection settings for the Daraja environment in use.
#[derive(Debug, Clone)]
pub struct DarajaConfig {
    /// e.g. `https://sandbox.safaricom.co.ke`
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub passkey: String,
    /// Where Daraja posts the out-of-band result; the relay feeds it back to
    /// us over the confirmation channel.
    pub callback_url: String,
}

pub struct DarajaGateway {
    config: DarajaConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    _merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    customer_message: Option<String>,
}

impl DarajaGateway {
    pub fn new(config: DarajaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected {
                reason: format!("token request returned {}", response.status()),
            });
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| GatewayError::Unreachable {
                detail: e.to_string(),
            })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for DarajaGateway {
    async fn initiate_charge(
        &self,
        amount: Amount,
        payer: &Msisdn,
        reference: &AccountReference,
    ) -> Result<ChargeAck, GatewayError> {
        let token = self.access_token().await?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = STANDARD.encode(format!(
            "{}{}{}",
            self.config.short_code, self.config.passkey, timestamp
        ));
        let payload = serde_json::json!({
            "BusinessShortCode": self.config.short_code,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount.value(),
            "PartyA": payer.as_str(),
            "PartyB": self.config.short_code,
            "PhoneNumber": payer.as_str(),
            "CallBackURL": self.config.callback_url,
            "AccountReference": reference.as_str(),
            "TransactionDesc": "Domain booking",
        });

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                reason: format!("STK push returned {status}: {body}"),
            });
        }

        let ack: StkPushResponse =
            response.json().await.map_err(|e| GatewayError::Unreachable {
                detail: e.to_string(),
            })?;

        if let Some(code) = &ack.response_code
            && code != "0"
        {
            return Err(GatewayError::Rejected {
                reason: ack
                    .response_description
                    .unwrap_or_else(|| format!("gateway response code {code}")),
            });
        }

        Ok(ChargeAck {
            correlation_id: ack.checkout_request_id.map(CorrelationId::new),
            customer_message: ack.customer_message,
        })
    }
}
