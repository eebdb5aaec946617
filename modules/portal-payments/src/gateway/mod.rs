//! Gateway-facing contract: the hosted card-capture widget and the
//! confirmation/step-up calls bound to an authorization's client secret.

pub mod error;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::PortalConfig;
use error::GatewayError;
use types::{GatewayConfirmation, GatewayErrorBody, PaymentIntent};

/// Handle onto the hosted card-capture element. The embedding UI mounts the
/// element against the authorization's client secret and reports readiness
/// here; the orchestrator refuses to confirm until it is ready.
pub trait CaptureWidget: Send + Sync {
    fn is_ready(&self) -> bool;
    /// Opaque payment-method handle the gateway resolves server-side.
    fn handle(&self) -> &str;
}

/// Confirmation and step-up calls against the gateway.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn confirm_payment(
        &self,
        client_secret: &str,
        widget: &dyn CaptureWidget,
    ) -> Result<GatewayConfirmation, GatewayError>;

    /// Drive the gateway's step-up (e.g. 3-D Secure) flow for the same
    /// client secret, returning the updated intent status.
    async fn handle_next_action(
        &self,
        client_secret: &str,
    ) -> Result<crate::models::AuthorizationStatus, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ConfirmPaymentRequest<'a> {
    client_secret: &'a str,
    payment_method: &'a str,
}

#[derive(Debug, Serialize)]
struct HandleActionRequest<'a> {
    client_secret: &'a str,
}

/// Production gateway client over the hosted-gateway REST surface.
#[derive(Clone)]
pub struct HostedGatewayClient {
    http_client: Client,
    base_path: String,
    publishable_key: String,
}

impl HostedGatewayClient {
    pub fn new(config: &PortalConfig) -> Result<Self, GatewayError> {
        let publishable_key = config
            .publishable_key
            .clone()
            .ok_or_else(|| GatewayError::ConfigError("Missing gateway publishable key".into()))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::HttpError(e.to_string()))?;

        Ok(HostedGatewayClient {
            http_client,
            base_path: config.gateway_base.clone(),
            publishable_key,
        })
    }

    async fn post_intent<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<PaymentIntent, GatewayError> {
        let url = format!("{}{}", self.base_path, path);
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.publishable_key))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::HttpError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let intent = response
                .json::<PaymentIntent>()
                .await
                .map_err(|e| GatewayError::ParseError(e.to_string()))?;
            if let Some(err) = &intent.last_payment_error {
                return Err(GatewayError::Provider {
                    code: err.code.clone(),
                    message: err.message.clone(),
                });
            }
            return Ok(intent);
        }

        let body_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        // Structured provider errors keep their code; anything else is a
        // plain API error.
        if let Ok(envelope) = serde_json::from_str::<GatewayErrorBody>(&body_text) {
            return Err(GatewayError::Provider {
                code: envelope.error.code,
                message: envelope.error.message,
            });
        }

        Err(GatewayError::ApiError {
            status_code: status.as_u16(),
            message: body_text,
        })
    }
}

#[async_trait]
impl GatewayApi for HostedGatewayClient {
    async fn confirm_payment(
        &self,
        client_secret: &str,
        widget: &dyn CaptureWidget,
    ) -> Result<GatewayConfirmation, GatewayError> {
        let request = ConfirmPaymentRequest {
            client_secret,
            payment_method: widget.handle(),
        };
        let intent = self.post_intent("/v1/payment-intents/confirm", &request).await?;
        tracing::debug!(intent_id = %intent.id, status = %intent.status, "gateway confirmation returned");
        Ok(GatewayConfirmation::from(&intent))
    }

    async fn handle_next_action(
        &self,
        client_secret: &str,
    ) -> Result<crate::models::AuthorizationStatus, GatewayError> {
        let request = HandleActionRequest { client_secret };
        let intent = self
            .post_intent("/v1/payment-intents/handle-action", &request)
            .await?;
        tracing::debug!(intent_id = %intent.id, status = %intent.status, "step-up action resolved");
        Ok(crate::models::AuthorizationStatus::from_wire(&intent.status))
    }
}
