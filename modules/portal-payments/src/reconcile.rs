//! Reconciliation client: records a gateway-confirmed payment against the
//! estimate's invoice on the backend ledger. Idempotent — a duplicate
//! submission is reported by the backend as `invoice_already_paid` and is
//! treated as success here, never as an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::PortalConfig;
use crate::error::PaymentError;
use crate::gateway::error::ProviderErrorKind;
use crate::models::Invoice;

pub const PROVIDER_NAME: &str = "hosted-gateway";

/// Outcome of a reconciliation call. `Pending` is a valid non-error result:
/// final settlement arrives out of band and this client never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Recorded,
    AlreadyPaid,
    Pending,
}

#[async_trait]
pub trait ReconciliationApi: Send + Sync {
    async fn confirm(
        &self,
        authorization_id: &str,
        invoice: &Invoice,
        amount: Decimal,
    ) -> Result<ReconcileOutcome, PaymentError>;
}

/// Process-scoped cache for the security nonce the ledger write requires.
/// Fetch-once; cleared on 401 so the next call refetches.
pub struct NonceCache {
    inner: Mutex<Option<String>>,
}

impl NonceCache {
    pub fn new() -> Self {
        NonceCache {
            inner: Mutex::new(None),
        }
    }

    async fn get(&self) -> Option<String> {
        self.inner.lock().await.clone()
    }

    async fn set(&self, nonce: String) {
        *self.inner.lock().await = Some(nonce);
    }

    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GatewayConfirmRequest<'a> {
    authorization_id: &'a str,
    estimate_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgerWriteRequest<'a> {
    estimate_id: &'a str,
    location_id: &'a str,
    invite_token: &'a str,
    amount: Decimal,
    provider: &'a str,
    transaction_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendEnvelope {
    ok: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    already_paid: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct NonceResponse {
    ok: bool,
    #[serde(default)]
    nonce: Option<String>,
}

/// Production client for both reconciliation endpoints: the gateway-session
/// confirm and the portal ledger write.
pub struct BackendReconciliationClient {
    http_client: Client,
    config: Arc<PortalConfig>,
    nonce: NonceCache,
}

impl BackendReconciliationClient {
    pub fn new(config: Arc<PortalConfig>) -> Result<Self, PaymentError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Http(e.to_string()))?;
        Ok(BackendReconciliationClient {
            http_client,
            config,
            nonce: NonceCache::new(),
        })
    }

    async fn fetch_nonce(&self) -> Result<String, PaymentError> {
        if let Some(nonce) = self.nonce.get().await {
            return Ok(nonce);
        }
        let url = format!("{}/api/portal/session/nonce", self.config.api_base);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| PaymentError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PaymentError::Backend(format!(
                "nonce fetch failed (status {})",
                response.status().as_u16()
            )));
        }
        let body: NonceResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Backend(e.to_string()))?;
        match (body.ok, body.nonce) {
            (true, Some(nonce)) => {
                self.nonce.set(nonce.clone()).await;
                Ok(nonce)
            }
            _ => Err(PaymentError::Backend("nonce fetch rejected".into())),
        }
    }

    /// Step 1: tell the backend to reconcile the authorization with the
    /// gateway. 202 / `payment_processing` means settlement is pending.
    async fn gateway_confirm(
        &self,
        authorization_id: &str,
        estimate_id: &str,
    ) -> Result<ReconcileOutcome, PaymentError> {
        let url = format!("{}/api/portal/payments/confirm", self.config.api_base);
        let response = self
            .http_client
            .post(&url)
            .json(&GatewayConfirmRequest {
                authorization_id,
                estimate_id,
            })
            .send()
            .await
            .map_err(|e| PaymentError::Http(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::ACCEPTED {
            return Ok(ReconcileOutcome::Pending);
        }

        let body: BackendEnvelope = response
            .json()
            .await
            .map_err(|e| PaymentError::Backend(e.to_string()))?;

        match body.code.as_deref() {
            Some("payment_processing") => return Ok(ReconcileOutcome::Pending),
            Some("payment_requires_action") => {
                return Err(PaymentError::Provider(
                    ProviderErrorKind::AuthenticationRequired,
                    body.message.unwrap_or_default(),
                ))
            }
            _ => {}
        }

        if status == StatusCode::PAYMENT_REQUIRED {
            return Err(PaymentError::Provider(
                ProviderErrorKind::AuthenticationRequired,
                body.message.unwrap_or_default(),
            ));
        }

        if !status.is_success() || !body.ok {
            return Err(PaymentError::Backend(
                body.message
                    .unwrap_or_else(|| format!("payment confirm failed (status {})", status.as_u16())),
            ));
        }

        Ok(ReconcileOutcome::Recorded)
    }

    /// Step 2: durably record the payment on the estimate's invoice. Retried
    /// exactly once on 401 after refreshing the nonce.
    async fn ledger_write(
        &self,
        invoice: &Invoice,
        amount: Decimal,
        transaction_id: &str,
    ) -> Result<ReconcileOutcome, PaymentError> {
        let url = format!("{}/api/portal/confirm-payment", self.config.api_base);
        let mut refreshed = false;

        loop {
            let nonce = self.fetch_nonce().await?;
            let response = self
                .http_client
                .post(&url)
                .header("x-portal-nonce", &nonce)
                .json(&LedgerWriteRequest {
                    estimate_id: &invoice.estimate_id,
                    location_id: &invoice.location_id,
                    invite_token: &self.config.invite_token,
                    amount,
                    provider: PROVIDER_NAME,
                    transaction_id,
                })
                .send()
                .await
                .map_err(|e| PaymentError::Http(e.to_string()))?;

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !refreshed {
                self.nonce.invalidate().await;
                refreshed = true;
                continue;
            }

            let body: BackendEnvelope = response
                .json()
                .await
                .map_err(|e| PaymentError::Backend(e.to_string()))?;

            // Duplicate submission: the invoice is already paid with this
            // transaction. Success-equivalent, never a second ledger entry.
            if body.code.as_deref() == Some("invoice_already_paid")
                && body.already_paid.unwrap_or(false)
            {
                tracing::info!(
                    estimate_id = %invoice.estimate_id,
                    transaction_id = %transaction_id,
                    "invoice already paid; treating reconciliation as success"
                );
                return Ok(ReconcileOutcome::AlreadyPaid);
            }

            if !status.is_success() || !body.ok {
                return Err(PaymentError::Backend(body.message.unwrap_or_else(|| {
                    format!("ledger write failed (status {})", status.as_u16())
                })));
            }

            return Ok(ReconcileOutcome::Recorded);
        }
    }
}

#[async_trait]
impl ReconciliationApi for BackendReconciliationClient {
    async fn confirm(
        &self,
        authorization_id: &str,
        invoice: &Invoice,
        amount: Decimal,
    ) -> Result<ReconcileOutcome, PaymentError> {
        let confirm_outcome = self
            .gateway_confirm(authorization_id, &invoice.estimate_id)
            .await?;

        // Pending settlement still gets a ledger record so the portal can
        // show the payment as processing; the backend marks it pending.
        let write_outcome = self
            .ledger_write(invoice, amount, authorization_id)
            .await?;

        let outcome = match (confirm_outcome, write_outcome) {
            (ReconcileOutcome::Pending, _) => ReconcileOutcome::Pending,
            (_, outcome) => outcome,
        };

        tracing::info!(
            authorization_id = %authorization_id,
            estimate_id = %invoice.estimate_id,
            amount = %amount,
            outcome = ?outcome,
            "reconciliation complete"
        );
        Ok(outcome)
    }
}
