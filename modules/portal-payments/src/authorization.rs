//! Authorization client: creates and queries payment-authorization objects
//! through the backend-mediated gateway session. Stateless request/response
//! wrapper; the orchestrator owns all attempt state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::PortalConfig;
use crate::error::PaymentError;
use crate::models::{to_minor_units, AuthorizationStatus, PaymentAuthorization};

#[async_trait]
pub trait AuthorizationApi: Send + Sync {
    /// Create a fresh authorization for `(amount, estimate)`. A successful
    /// create replaces any prior authorization for the session; the caller
    /// must reset capture-widget readiness.
    async fn create(
        &self,
        amount: Decimal,
        estimate_id: &str,
        location_id: &str,
    ) -> Result<PaymentAuthorization, PaymentError>;

    /// Current gateway-side status. `NotFound` means the authorization
    /// expired or never existed; the caller must discard local state and
    /// create afresh.
    async fn get_status(&self, authorization_id: &str) -> Result<AuthorizationStatus, PaymentError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAuthorizationRequest<'a> {
    amount: i64,
    currency: &'a str,
    estimate_id: &'a str,
    metadata: AuthorizationMetadata<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationMetadata<'a> {
    estimate_id: &'a str,
    location_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAuthorizationResponse {
    ok: bool,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    authorization_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest<'a> {
    authorization_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    ok: bool,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Production client against the portal backend.
#[derive(Clone)]
pub struct BackendAuthorizationClient {
    http_client: Client,
    config: Arc<PortalConfig>,
}

impl BackendAuthorizationClient {
    pub fn new(config: Arc<PortalConfig>) -> Result<Self, PaymentError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Http(e.to_string()))?;
        Ok(BackendAuthorizationClient { http_client, config })
    }
}

#[async_trait]
impl AuthorizationApi for BackendAuthorizationClient {
    async fn create(
        &self,
        amount: Decimal,
        estimate_id: &str,
        location_id: &str,
    ) -> Result<PaymentAuthorization, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(
                "Payment amount must be greater than zero".into(),
            ));
        }
        if !self.config.payments_available() {
            return Err(PaymentError::GatewayUnavailable);
        }

        let url = format!("{}/api/portal/payments/authorization", self.config.api_base);
        let request = CreateAuthorizationRequest {
            amount: to_minor_units(amount),
            currency: "usd",
            estimate_id,
            metadata: AuthorizationMetadata {
                estimate_id,
                location_id,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Backend(format!(
                "authorization create failed (status {}): {}",
                status.as_u16(),
                body
            )));
        }

        let body: CreateAuthorizationResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Backend(e.to_string()))?;

        if !body.ok {
            return Err(PaymentError::Backend(
                body.message
                    .unwrap_or_else(|| "authorization create rejected".into()),
            ));
        }

        match (body.authorization_id, body.client_secret) {
            (Some(authorization_id), Some(client_secret)) => {
                tracing::info!(
                    authorization_id = %authorization_id,
                    estimate_id = %estimate_id,
                    amount = %amount,
                    "payment authorization created"
                );
                Ok(PaymentAuthorization {
                    authorization_id,
                    client_secret,
                    amount,
                    estimate_id: estimate_id.to_string(),
                })
            }
            _ => Err(PaymentError::Backend(
                "authorization create response missing clientSecret/authorizationId".into(),
            )),
        }
    }

    async fn get_status(&self, authorization_id: &str) -> Result<AuthorizationStatus, PaymentError> {
        let url = format!(
            "{}/api/portal/payments/authorization/status",
            self.config.api_base
        );
        let response = self
            .http_client
            .post(&url)
            .json(&StatusRequest { authorization_id })
            .send()
            .await
            .map_err(|e| PaymentError::Http(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(AuthorizationStatus::NotFound);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Backend(format!(
                "authorization status failed (status {}): {}",
                status.as_u16(),
                body
            )));
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Backend(e.to_string()))?;

        if !body.ok {
            return Err(PaymentError::Backend(
                body.message.unwrap_or_else(|| "authorization status rejected".into()),
            ));
        }

        Ok(body
            .status
            .as_deref()
            .map(AuthorizationStatus::from_wire)
            .unwrap_or(AuthorizationStatus::NotFound))
    }
}
