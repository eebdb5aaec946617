use thiserror::Error;

use crate::gateway::error::ProviderErrorKind;

/// Crate-wide payment error. Nothing here is fatal: every variant leaves the
/// attempt in a resubmittable state, and every variant carries a message fit
/// for display.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),

    #[error("Payments are unavailable: no payment provider is configured")]
    GatewayUnavailable,

    #[error("The card form is not ready yet")]
    CaptureNotReady,

    #[error("This payment session has expired. Please try again.")]
    SessionExpired,

    #[error("This payment was canceled. Please try again.")]
    PaymentCanceled,

    #[error("Card authentication was not completed. Please try again.")]
    AuthenticationIncomplete,

    #[error("{}", .0.user_message(.1.as_str()))]
    Provider(ProviderErrorKind, String),

    #[error("Payment service error: {0}")]
    Backend(String),

    #[error("Network error: {0}")]
    Http(String),
}

impl PaymentError {
    /// Message for display in the portal UI.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Errors that mean the current authorization is no longer usable and
    /// must be discarded before the next submit.
    pub fn invalidates_authorization(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::PaymentCanceled)
    }
}
