//! Confirmation orchestrator: the state machine driving one payment attempt
//! end to end — authorization creation, card capture, gateway confirmation,
//! step-up authentication, and ledger reconciliation.
//!
//! The submit protocol is two explicit clicks: the first creates the
//! authorization and returns control so the UI can mount the capture widget;
//! the second runs the confirmation. Every retry is a fresh user submit;
//! nothing here retries on its own.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::authorization::AuthorizationApi;
use crate::error::PaymentError;
use crate::gateway::error::{GatewayError, ProviderErrorKind};
use crate::gateway::{CaptureWidget, GatewayApi};
use crate::models::{AuthorizationStatus, Invoice, PaymentAuthorization};
use crate::reconcile::{ReconcileOutcome, ReconciliationApi};

/// Attempt state as a first-class value. `RequiresAction` and `Processing`
/// are observable mid-states; `Succeeded`, `Canceled`, and `Failed` are
/// terminal for the attempt (the machine itself stays resubmittable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    CreatingAuthorization,
    AwaitingCapture,
    Confirming,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

/// What the caller should do after a submit.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Authorization exists; mount the capture widget and submit again.
    AuthorizationReady,
    /// Terminal success; refresh the invoice/payment views.
    Succeeded,
    /// Payment accepted, settlement pending out of band.
    Processing,
    /// Attempt failed with a displayable error; resubmit is allowed.
    Failed(PaymentError),
    /// Another submit is already in flight; this one was a no-op.
    InFlight,
}

pub struct ConfirmationOrchestrator {
    authorization_api: Arc<dyn AuthorizationApi>,
    gateway_api: Arc<dyn GatewayApi>,
    reconciliation_api: Arc<dyn ReconciliationApi>,

    state: AttemptState,
    /// Correlates all log lines of one attempt; rotated on invalidation.
    attempt_id: Uuid,
    authorization: Option<PaymentAuthorization>,
    is_creating_authorization: bool,
    is_confirming: bool,
    capture_widget_ready: bool,
    last_error: Option<PaymentError>,
}

impl ConfirmationOrchestrator {
    pub fn new(
        authorization_api: Arc<dyn AuthorizationApi>,
        gateway_api: Arc<dyn GatewayApi>,
        reconciliation_api: Arc<dyn ReconciliationApi>,
    ) -> Self {
        ConfirmationOrchestrator {
            authorization_api,
            gateway_api,
            reconciliation_api,
            state: AttemptState::Idle,
            attempt_id: Uuid::new_v4(),
            authorization: None,
            is_creating_authorization: false,
            is_confirming: false,
            capture_widget_ready: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn authorization(&self) -> Option<&PaymentAuthorization> {
        self.authorization.as_ref()
    }

    pub fn last_error(&self) -> Option<&PaymentError> {
        self.last_error.as_ref()
    }

    pub fn capture_widget_ready(&self) -> bool {
        self.capture_widget_ready
    }

    /// The embedding UI reports that the capture widget mounted against the
    /// current client secret and is interactive.
    pub fn set_capture_ready(&mut self, ready: bool) {
        self.capture_widget_ready = ready;
    }

    /// Unconditional reset to `Idle`, discarding any authorization. Called
    /// whenever the amount or estimate changes, even mid-attempt; a late
    /// response for the stale pair is ignored because all state is rebuilt
    /// from here.
    pub fn invalidate(&mut self) {
        if let Some(auth) = &self.authorization {
            tracing::info!(
                attempt_id = %self.attempt_id,
                authorization_id = %auth.authorization_id,
                "discarding payment authorization"
            );
        }
        self.attempt_id = Uuid::new_v4();
        self.authorization = None;
        self.capture_widget_ready = false;
        self.is_creating_authorization = false;
        self.is_confirming = false;
        self.last_error = None;
        self.state = AttemptState::Idle;
    }

    /// Drive one submit. See the module docs for the two-click protocol.
    pub async fn submit(
        &mut self,
        amount: Decimal,
        invoice: &Invoice,
        widget: &dyn CaptureWidget,
    ) -> SubmitOutcome {
        // Concurrency guard: overlapping submissions are no-ops.
        if self.is_creating_authorization || self.is_confirming {
            tracing::debug!("submit ignored: another submission is in flight");
            return SubmitOutcome::InFlight;
        }

        // An authorization is bound to one (amount, estimate) pair. A stale
        // pair is discarded before anything else happens.
        let stale = self
            .authorization
            .as_ref()
            .map(|auth| auth.amount != amount || auth.estimate_id != invoice.estimate_id)
            .unwrap_or(false);
        if stale {
            self.invalidate();
        }

        if self.authorization.is_none() {
            return self.create_authorization(amount, invoice).await;
        }

        // Second click: confirm. The widget must be mounted first.
        if !self.capture_widget_ready || !widget.is_ready() {
            self.last_error = Some(PaymentError::CaptureNotReady);
            return SubmitOutcome::Failed(PaymentError::CaptureNotReady);
        }

        self.is_confirming = true;
        self.state = AttemptState::Confirming;
        let result = self.run_confirmation(invoice, widget).await;
        self.is_confirming = false;

        match result {
            Ok(outcome) => outcome,
            Err(err) => self.fail(err),
        }
    }

    async fn create_authorization(
        &mut self,
        amount: Decimal,
        invoice: &Invoice,
    ) -> SubmitOutcome {
        self.is_creating_authorization = true;
        self.state = AttemptState::CreatingAuthorization;

        let result = self
            .authorization_api
            .create(amount, &invoice.estimate_id, &invoice.location_id)
            .await;
        self.is_creating_authorization = false;

        match result {
            Ok(auth) => {
                tracing::info!(
                    attempt_id = %self.attempt_id,
                    authorization_id = %auth.authorization_id,
                    estimate_id = %invoice.estimate_id,
                    amount = %amount,
                    "awaiting card capture"
                );
                self.authorization = Some(auth);
                self.capture_widget_ready = false;
                self.last_error = None;
                self.state = AttemptState::AwaitingCapture;
                SubmitOutcome::AuthorizationReady
            }
            Err(err) => self.fail(err),
        }
    }

    async fn run_confirmation(
        &mut self,
        invoice: &Invoice,
        widget: &dyn CaptureWidget,
    ) -> Result<SubmitOutcome, PaymentError> {
        let Some(auth) = self.authorization.clone() else {
            return Err(PaymentError::SessionExpired);
        };

        // Race guard: a previous attempt may have completed (or the
        // authorization may have expired) while this client wasn't looking.
        let status = self
            .authorization_api
            .get_status(&auth.authorization_id)
            .await?;

        match status {
            AuthorizationStatus::NotFound => return Err(PaymentError::SessionExpired),
            AuthorizationStatus::Canceled => return Err(PaymentError::PaymentCanceled),
            AuthorizationStatus::Succeeded => {
                // Already confirmed gateway-side; skip straight to the
                // ledger. Reconciliation is the source of truth for success.
                tracing::info!(
                    authorization_id = %auth.authorization_id,
                    "authorization already succeeded; skipping gateway confirmation"
                );
                return self.reconcile(&auth, invoice, AuthorizationStatus::Succeeded).await;
            }
            _ => {}
        }

        let status = match self
            .gateway_api
            .confirm_payment(&auth.client_secret, widget)
            .await
        {
            Ok(confirmation) => confirmation.status,
            // The same race seen from the other side: the status check
            // missed it but the confirmation call reveals it.
            Err(err) if err.is_already_succeeded() => AuthorizationStatus::Succeeded,
            Err(err) => return Err(map_gateway_error(err)),
        };

        let status = if status == AuthorizationStatus::RequiresAction {
            self.state = AttemptState::RequiresAction;
            tracing::info!(
                authorization_id = %auth.authorization_id,
                "step-up authentication required"
            );
            let resolved = self
                .gateway_api
                .handle_next_action(&auth.client_secret)
                .await
                .map_err(map_gateway_error)?;
            if resolved == AuthorizationStatus::RequiresAction {
                // One round only; a second demand means the step-up was
                // abandoned or rejected.
                return Err(PaymentError::AuthenticationIncomplete);
            }
            resolved
        } else {
            status
        };

        match status {
            AuthorizationStatus::Succeeded | AuthorizationStatus::Processing => {
                self.reconcile(&auth, invoice, status).await
            }
            AuthorizationStatus::Canceled => Err(PaymentError::PaymentCanceled),
            other => Err(PaymentError::Backend(format!(
                "unexpected gateway status after confirmation: {other}"
            ))),
        }
    }

    async fn reconcile(
        &mut self,
        auth: &PaymentAuthorization,
        invoice: &Invoice,
        gateway_status: AuthorizationStatus,
    ) -> Result<SubmitOutcome, PaymentError> {
        if gateway_status == AuthorizationStatus::Processing {
            self.state = AttemptState::Processing;
        }

        let outcome = self
            .reconciliation_api
            .confirm(&auth.authorization_id, invoice, auth.amount)
            .await?;

        // The attempt is over either way; the authorization must not be
        // reusable for another charge.
        self.authorization = None;
        self.capture_widget_ready = false;
        self.last_error = None;

        match outcome {
            ReconcileOutcome::Recorded | ReconcileOutcome::AlreadyPaid => {
                self.state = AttemptState::Succeeded;
                tracing::info!(
                    attempt_id = %self.attempt_id,
                    authorization_id = %auth.authorization_id,
                    estimate_id = %invoice.estimate_id,
                    "payment succeeded"
                );
                Ok(SubmitOutcome::Succeeded)
            }
            ReconcileOutcome::Pending => {
                self.state = AttemptState::Processing;
                tracing::info!(
                    authorization_id = %auth.authorization_id,
                    estimate_id = %invoice.estimate_id,
                    "payment processing; settlement pending"
                );
                Ok(SubmitOutcome::Processing)
            }
        }
    }

    fn fail(&mut self, err: PaymentError) -> SubmitOutcome {
        if err.invalidates_authorization() {
            // Expired/canceled sessions discard the authorization so the
            // next submit starts from a fresh one.
            self.authorization = None;
            self.capture_widget_ready = false;
            self.state = if matches!(err, PaymentError::PaymentCanceled) {
                AttemptState::Canceled
            } else {
                AttemptState::Idle
            };
        } else {
            self.state = AttemptState::Failed;
        }
        tracing::warn!(
            attempt_id = %self.attempt_id,
            error = %err,
            state = ?self.state,
            "payment attempt failed"
        );
        self.last_error = Some(err.clone());
        SubmitOutcome::Failed(err)
    }
}

fn map_gateway_error(err: GatewayError) -> PaymentError {
    match err {
        GatewayError::Provider { code, message } => {
            PaymentError::Provider(ProviderErrorKind::from_code(&code), message)
        }
        GatewayError::HttpError(msg) => PaymentError::Http(msg),
        other => PaymentError::Backend(other.to_string()),
    }
}
