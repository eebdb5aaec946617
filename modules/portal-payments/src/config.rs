use crate::error::PaymentError;

/// Portal payment configuration.
///
/// A missing publishable key is not an error: the portal renders a
/// "payments unavailable" state instead of the payment form.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub api_base: String,
    pub gateway_base: String,
    pub publishable_key: Option<String>,
    pub invite_token: String,
}

impl PortalConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok();

        let api_base = std::env::var("PORTAL_API_BASE")
            .map_err(|_| PaymentError::Backend("Missing PORTAL_API_BASE".into()))?;
        let invite_token = std::env::var("PORTAL_INVITE_TOKEN")
            .map_err(|_| PaymentError::Backend("Missing PORTAL_INVITE_TOKEN".into()))?;

        let publishable_key = std::env::var("GATEWAY_PUBLISHABLE_KEY").ok().filter(|k| !k.is_empty());

        let sandbox = std::env::var("GATEWAY_SANDBOX")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);
        let gateway_base = std::env::var("GATEWAY_API_BASE").unwrap_or_else(|_| {
            if sandbox {
                "https://sandbox-api.gateway.example.com".to_string()
            } else {
                "https://api.gateway.example.com".to_string()
            }
        });

        Ok(PortalConfig {
            api_base,
            gateway_base,
            publishable_key,
            invite_token,
        })
    }

    pub fn payments_available(&self) -> bool {
        self.publishable_key.is_some()
    }
}
