use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

// ============================================================================
// INVOICE / PAYMENT STATE (backend-owned, read-only on the client)
// ============================================================================

/// Invoice snapshot for one estimate. Immutable once fetched; `total` is the
/// ceiling on any payment against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub estimate_id: String,
    pub location_id: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    None,
    Partial,
    Paid,
}

/// One entry in the invoice's payment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEntry {
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    pub provider: String,
    pub transaction_id: String,
}

/// Aggregate payment state for an invoice. Mutated only by successful
/// reconciliation on the backend; the client never writes to it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub remaining_balance: Decimal,
    #[serde(default)]
    pub payments: Vec<PaymentEntry>,
}

/// Server-computed amount-legality record. When present this is the single
/// source of truth; client-side derivation is a fallback only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimumPaymentInfo {
    pub minimum_payment: Decimal,
    pub remaining_balance: Decimal,
    pub existing_paid_amount: Decimal,
    pub requires_full_payment: bool,
}

// ============================================================================
// AMOUNT SELECTION
// ============================================================================

/// User's choice of how much to pay. Presets are fractions of the remaining
/// balance; `Custom` carries a user-entered dollar amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmountSelection {
    Preset25,
    Preset50,
    Preset75,
    Minimum,
    Full,
    Custom(Decimal),
}

// ============================================================================
// AUTHORIZATION
// ============================================================================

/// Server-side payment-authorization object for one `(amount, estimate)`
/// pair. Never reused across a different amount or estimate.
#[derive(Debug, Clone)]
pub struct PaymentAuthorization {
    pub authorization_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    pub estimate_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Created,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    NotFound,
}

impl AuthorizationStatus {
    /// Total mapping from gateway status strings. Unknown strings map to
    /// `Processing`, the conservative non-terminal default.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "created" | "requires_payment_method" | "requires_confirmation" => Self::Created,
            "requires_action" => Self::RequiresAction,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "canceled" => Self::Canceled,
            "not_found" => Self::NotFound,
            _ => Self::Processing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MONEY HELPERS
// ============================================================================

/// Convert a dollar amount to gateway minor units (cents), rounding the
/// midpoint away from zero. Amounts are validated positive and bounded by
/// the invoice total before they reach the wire.
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Equality within one cent, used for the full-balance rule on custom
/// amounts entered as free text.
pub fn within_one_cent(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= Decimal::new(1, 2)
}

/// Display form for user-facing messages, e.g. `$100.00`.
pub fn fmt_usd(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_round_trip() {
        assert_eq!(to_minor_units(Decimal::new(12550, 2)), 12550);
        assert_eq!(from_minor_units(12550), Decimal::new(12550, 2));
    }

    #[test]
    fn minor_units_round_half_up() {
        // 10.005 dollars -> 1001 cents (midpoint away from zero)
        assert_eq!(to_minor_units(Decimal::new(10005, 3)), 1001);
    }

    #[test]
    fn one_cent_tolerance() {
        let a = Decimal::new(10000, 2);
        assert!(within_one_cent(a, Decimal::new(10001, 2)));
        assert!(within_one_cent(a, Decimal::new(9999, 2)));
        assert!(!within_one_cent(a, Decimal::new(10002, 2)));
    }

    #[test]
    fn status_wire_mapping_is_total() {
        assert_eq!(AuthorizationStatus::from_wire("succeeded"), AuthorizationStatus::Succeeded);
        assert_eq!(AuthorizationStatus::from_wire("requires_action"), AuthorizationStatus::RequiresAction);
        // Unknown strings stay non-terminal
        assert_eq!(AuthorizationStatus::from_wire("some_future_status"), AuthorizationStatus::Processing);
    }
}
