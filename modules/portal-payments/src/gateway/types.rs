use serde::{Deserialize, Serialize};

use crate::models::AuthorizationStatus;

/// Payment intent as the gateway returns it on confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_error: Option<ProviderError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

/// Error envelope the gateway uses on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct GatewayErrorBody {
    pub error: ProviderError,
}

/// Distilled result of a gateway confirmation call.
#[derive(Debug, Clone)]
pub struct GatewayConfirmation {
    pub intent_id: String,
    pub status: AuthorizationStatus,
}

impl From<&PaymentIntent> for GatewayConfirmation {
    fn from(intent: &PaymentIntent) -> Self {
        GatewayConfirmation {
            intent_id: intent.id.clone(),
            status: AuthorizationStatus::from_wire(&intent.status),
        }
    }
}
