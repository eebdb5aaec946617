//! Payment session host: the UI-facing container that owns amount-selection
//! state, gates the capture widget on an authorization existing, and
//! re-derives everything whenever the invoice, estimate, or amount changes.

use std::sync::Arc;

use crate::amounts::ResolvedAmounts;
use crate::config::PortalConfig;
use crate::error::PaymentError;
use crate::gateway::CaptureWidget;
use crate::models::{AmountSelection, Invoice, MinimumPaymentInfo, PaymentRecord};
use crate::orchestrator::{AttemptState, ConfirmationOrchestrator, SubmitOutcome};

/// Derived view of the session for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No publishable key configured; the payment form never renders.
    Unavailable,
    SelectingAmount,
    AwaitingCapture,
    Confirming,
    Processing,
    Succeeded,
    Failed,
}

pub struct PaymentSession {
    config: Arc<PortalConfig>,
    invoice: Invoice,
    payment_record: Option<PaymentRecord>,
    minimum_payment_info: Option<MinimumPaymentInfo>,
    selection: Option<AmountSelection>,
    orchestrator: ConfirmationOrchestrator,
}

impl PaymentSession {
    pub fn new(
        config: Arc<PortalConfig>,
        invoice: Invoice,
        payment_record: Option<PaymentRecord>,
        minimum_payment_info: Option<MinimumPaymentInfo>,
        orchestrator: ConfirmationOrchestrator,
    ) -> Self {
        PaymentSession {
            config,
            invoice,
            payment_record,
            minimum_payment_info,
            selection: None,
            orchestrator,
        }
    }

    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn selection(&self) -> Option<&AmountSelection> {
        self.selection.as_ref()
    }

    /// Resolve the current amounts from invoice/payment state and the
    /// selection. Pure; safe to call on every render.
    pub fn resolved(&self) -> ResolvedAmounts {
        ResolvedAmounts::resolve(
            &self.invoice,
            self.payment_record.as_ref(),
            self.minimum_payment_info.as_ref(),
            self.selection.as_ref(),
        )
    }

    /// Change the amount selection. A payable-amount change discards the
    /// whole attempt immediately: any authorization, widget readiness, and
    /// the last error all go with it.
    pub fn select(&mut self, selection: AmountSelection) {
        let before = self.resolved().payable_amount;
        self.selection = Some(selection);
        let after = self.resolved().payable_amount;
        if before != after {
            self.orchestrator.invalidate();
        }
    }

    /// Replace the estimate/invoice under the session. Full invalidation:
    /// selection cleared, authorization discarded, attempt reset.
    pub fn set_estimate(
        &mut self,
        invoice: Invoice,
        payment_record: Option<PaymentRecord>,
        minimum_payment_info: Option<MinimumPaymentInfo>,
    ) {
        self.invoice = invoice;
        self.payment_record = payment_record;
        self.minimum_payment_info = minimum_payment_info;
        self.selection = None;
        self.orchestrator.invalidate();
    }

    /// Refresh payment state after reconciliation (backend-owned; the
    /// session never mutates it locally).
    pub fn refresh_payment_state(
        &mut self,
        payment_record: Option<PaymentRecord>,
        minimum_payment_info: Option<MinimumPaymentInfo>,
    ) {
        self.payment_record = payment_record;
        self.minimum_payment_info = minimum_payment_info;
    }

    /// The embedding UI reports the capture widget mounted and interactive.
    pub fn mark_capture_ready(&mut self) {
        self.orchestrator.set_capture_ready(true);
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.config.payments_available() {
            return SessionPhase::Unavailable;
        }
        match self.orchestrator.state() {
            AttemptState::Idle | AttemptState::Canceled => SessionPhase::SelectingAmount,
            AttemptState::CreatingAuthorization | AttemptState::AwaitingCapture => {
                SessionPhase::AwaitingCapture
            }
            AttemptState::Confirming | AttemptState::RequiresAction => SessionPhase::Confirming,
            AttemptState::Processing => SessionPhase::Processing,
            AttemptState::Succeeded => SessionPhase::Succeeded,
            AttemptState::Failed => SessionPhase::Failed,
        }
    }

    pub fn last_error(&self) -> Option<&PaymentError> {
        self.orchestrator.last_error()
    }

    /// Drive one submit: validation is local-only; anything invalid never
    /// reaches the network.
    pub async fn submit(&mut self, widget: &dyn CaptureWidget) -> SubmitOutcome {
        if !self.config.payments_available() {
            return SubmitOutcome::Failed(PaymentError::GatewayUnavailable);
        }

        let resolved = self.resolved();
        if !resolved.is_amount_valid() {
            let reason = resolved
                .invalid_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "Select a payment amount to continue".into());
            return SubmitOutcome::Failed(PaymentError::InvalidAmount(reason));
        }
        let Some(amount) = resolved.payable_amount else {
            return SubmitOutcome::Failed(PaymentError::InvalidAmount(
                "Select a payment amount to continue".into(),
            ));
        };

        self.orchestrator.submit(amount, &self.invoice, widget).await
    }
}
