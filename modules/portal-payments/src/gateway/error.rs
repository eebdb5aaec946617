use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    /// Structured error the provider attached to a payment attempt.
    #[error("Provider error ({code}): {message}")]
    Provider { code: String, message: String },
}

impl GatewayError {
    /// The unexpected-state class of provider error that means a previous
    /// attempt already completed this payment. Treated as success upstream,
    /// not as a failure.
    pub fn is_already_succeeded(&self) -> bool {
        matches!(
            self,
            GatewayError::Provider { code, message }
                if code == "payment_intent_unexpected_state" && message.contains("succeeded")
        )
    }
}

/// User-facing categories for provider error codes. The mapping is total:
/// anything unrecognized lands in `Generic` and falls back to the raw
/// provider message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Declined,
    InsufficientFunds,
    ExpiredCard,
    IncorrectCvc,
    IncorrectNumber,
    ProcessingError,
    AuthenticationRequired,
    Generic,
}

impl ProviderErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "card_declined" | "generic_decline" | "do_not_honor" => Self::Declined,
            "insufficient_funds" => Self::InsufficientFunds,
            "expired_card" => Self::ExpiredCard,
            "incorrect_cvc" | "invalid_cvc" => Self::IncorrectCvc,
            "incorrect_number" | "invalid_number" => Self::IncorrectNumber,
            "processing_error" => Self::ProcessingError,
            "authentication_required" | "payment_requires_action" => Self::AuthenticationRequired,
            _ => Self::Generic,
        }
    }

    /// Exactly one message per category; `Generic` echoes the raw provider
    /// message so nothing is swallowed.
    pub fn user_message(&self, raw: &str) -> String {
        match self {
            Self::Declined => "Your card was declined. Please try a different card.".to_string(),
            Self::InsufficientFunds => {
                "Your card has insufficient funds. Please try a different card.".to_string()
            }
            Self::ExpiredCard => "Your card has expired. Please try a different card.".to_string(),
            Self::IncorrectCvc => "The security code is incorrect. Please check and retry.".to_string(),
            Self::IncorrectNumber => "The card number is incorrect. Please check and retry.".to_string(),
            Self::ProcessingError => {
                "An error occurred while processing your card. Please try again.".to_string()
            }
            Self::AuthenticationRequired => {
                "Your bank requires additional authentication for this payment.".to_string()
            }
            Self::Generic => raw.to_string(),
        }
    }
}
