//! Pure amount resolution for the payment form.
//!
//! Computes the legal payable amount from invoice/payment state and the
//! user's selection under the partial/minimum/full-payment business rules.
//! No I/O; the server-computed `MinimumPaymentInfo` is preferred and the
//! local derivation is a fallback only.

use rust_decimal::Decimal;

use crate::models::{
    fmt_usd, within_one_cent, AmountSelection, Invoice, MinimumPaymentInfo, PaymentRecord,
    PaymentStatus,
};

/// Why a selection failed validation. Carries enough to render the exact
/// user-facing message.
#[derive(Debug, Clone, PartialEq)]
pub enum AmountInvalidReason {
    NoSelection,
    NotPositive,
    BelowMinimum { minimum: Decimal },
    ExceedsBalance { remaining: Decimal },
    ExceedsInvoiceTotal { total: Decimal },
    MustPayFullBalance { remaining: Decimal },
}

impl std::fmt::Display for AmountInvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSelection => write!(f, "Select a payment amount to continue"),
            Self::NotPositive => write!(f, "Payment amount must be greater than zero"),
            Self::BelowMinimum { minimum } => {
                write!(f, "Payment amount must be at least {}", fmt_usd(*minimum))
            }
            Self::ExceedsBalance { remaining } => write!(
                f,
                "Payment amount cannot exceed the remaining balance of {}",
                fmt_usd(*remaining)
            ),
            Self::ExceedsInvoiceTotal { total } => write!(
                f,
                "Payment amount cannot exceed the invoice total of {}",
                fmt_usd(*total)
            ),
            Self::MustPayFullBalance { remaining } => write!(
                f,
                "This payment must be the full remaining balance of {}",
                fmt_usd(*remaining)
            ),
        }
    }
}

/// Output of amount resolution: the derived balances plus the resolved
/// payable amount (if any) and the validation verdict for the current
/// selection.
#[derive(Debug, Clone)]
pub struct ResolvedAmounts {
    pub remaining_balance: Decimal,
    pub minimum_payment: Decimal,
    pub existing_paid_amount: Decimal,
    pub requires_full_payment: bool,
    /// True when the remaining balance fell below the minimum, leaving the
    /// full balance as the only legal selection.
    pub full_payment_only: bool,
    pub payable_amount: Option<Decimal>,
    pub invalid_reason: Option<AmountInvalidReason>,
}

impl ResolvedAmounts {
    pub fn resolve(
        invoice: &Invoice,
        payment_record: Option<&PaymentRecord>,
        minimum_payment_info: Option<&MinimumPaymentInfo>,
        selection: Option<&AmountSelection>,
    ) -> Self {
        let paid = minimum_payment_info
            .map(|i| i.existing_paid_amount)
            .or_else(|| payment_record.map(|r| r.amount))
            .unwrap_or(Decimal::ZERO);

        // Server value preferred; fallback derives remaining from the total.
        let remaining = minimum_payment_info
            .map(|i| i.remaining_balance)
            .unwrap_or_else(|| (invoice.total - paid).max(Decimal::ZERO))
            .min(invoice.total)
            .max(Decimal::ZERO);

        let minimum = minimum_payment_info
            .map(|i| i.minimum_payment)
            .unwrap_or(Decimal::ZERO);

        let requires_full_payment = minimum_payment_info
            .map(|i| i.requires_full_payment)
            .unwrap_or_else(|| {
                payment_record
                    .map(|r| r.status == PaymentStatus::Partial && r.amount > Decimal::ZERO)
                    .unwrap_or(false)
            });

        // First-payment edge case: remaining already below the minimum means
        // the full balance is the only legal amount.
        let full_payment_only = !requires_full_payment && remaining < minimum;

        let mut resolved = ResolvedAmounts {
            remaining_balance: remaining,
            minimum_payment: minimum,
            existing_paid_amount: paid,
            requires_full_payment,
            full_payment_only,
            payable_amount: None,
            invalid_reason: None,
        };

        if requires_full_payment {
            // Only the full remaining balance is legal; the selection cannot
            // change the payable amount, but a mismatched custom entry is
            // still reported so the form can explain the rule.
            resolved.payable_amount = Some(remaining);
            if let Some(AmountSelection::Custom(c)) = selection {
                if !within_one_cent(*c, remaining) {
                    resolved.invalid_reason =
                        Some(AmountInvalidReason::MustPayFullBalance { remaining });
                }
            }
            return resolved;
        }

        if full_payment_only {
            resolved.payable_amount = Some(remaining);
            return resolved;
        }

        let Some(selection) = selection else {
            resolved.invalid_reason = Some(AmountInvalidReason::NoSelection);
            return resolved;
        };

        let amount = match selection {
            AmountSelection::Preset25 => preset_value(remaining, 25),
            AmountSelection::Preset50 => preset_value(remaining, 50),
            AmountSelection::Preset75 => preset_value(remaining, 75),
            AmountSelection::Minimum => minimum,
            AmountSelection::Full => remaining,
            AmountSelection::Custom(c) => *c,
        };

        resolved.payable_amount = Some(amount);
        resolved.invalid_reason = validate_amount(amount, minimum, remaining, invoice.total);
        resolved
    }

    /// Presets the form may offer: 25/50/75% of the remaining balance plus
    /// minimum and full, each gated at the minimum payment.
    pub fn offered_presets(&self) -> Vec<(AmountSelection, Decimal)> {
        if self.requires_full_payment || self.full_payment_only {
            return vec![(AmountSelection::Full, self.remaining_balance)];
        }
        let mut out = Vec::new();
        for (sel, pct) in [
            (AmountSelection::Preset25, 25),
            (AmountSelection::Preset50, 50),
            (AmountSelection::Preset75, 75),
        ] {
            let value = preset_value(self.remaining_balance, pct);
            if value >= self.minimum_payment {
                out.push((sel, value));
            }
        }
        if self.minimum_payment > Decimal::ZERO {
            out.push((AmountSelection::Minimum, self.minimum_payment));
        }
        out.push((AmountSelection::Full, self.remaining_balance));
        out
    }

    pub fn is_amount_valid(&self) -> bool {
        if self.invalid_reason.is_some() {
            return false;
        }
        match self.payable_amount {
            Some(amount) => amount > Decimal::ZERO && amount >= self.minimum_payment.min(self.remaining_balance),
            None => false,
        }
    }
}

fn preset_value(remaining: Decimal, pct: u32) -> Decimal {
    (remaining * Decimal::new(pct.into(), 2)).round_dp(2)
}

fn validate_amount(
    amount: Decimal,
    minimum: Decimal,
    remaining: Decimal,
    total: Decimal,
) -> Option<AmountInvalidReason> {
    if amount <= Decimal::ZERO {
        return Some(AmountInvalidReason::NotPositive);
    }
    if amount < minimum {
        return Some(AmountInvalidReason::BelowMinimum { minimum });
    }
    if amount > total {
        return Some(AmountInvalidReason::ExceedsInvoiceTotal { total });
    }
    if amount > remaining {
        return Some(AmountInvalidReason::ExceedsBalance { remaining });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(total: Decimal) -> Invoice {
        Invoice {
            estimate_id: "est_1".into(),
            location_id: "loc_1".into(),
            total,
        }
    }

    fn dollars(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn fallback_derives_remaining_from_record() {
        let inv = invoice(dollars(50000));
        let record = PaymentRecord {
            status: PaymentStatus::Partial,
            amount: dollars(10000),
            remaining_balance: dollars(40000),
            payments: vec![],
        };
        let resolved = ResolvedAmounts::resolve(&inv, Some(&record), None, None);
        assert_eq!(resolved.remaining_balance, dollars(40000));
    }

    #[test]
    fn fallback_remaining_never_negative() {
        let inv = invoice(dollars(10000));
        let record = PaymentRecord {
            status: PaymentStatus::Paid,
            amount: dollars(15000),
            remaining_balance: Decimal::ZERO,
            payments: vec![],
        };
        let resolved = ResolvedAmounts::resolve(&inv, Some(&record), None, None);
        assert_eq!(resolved.remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn preset_values_for_first_payment() {
        let inv = invoice(dollars(50000));
        let info = MinimumPaymentInfo {
            minimum_payment: dollars(10000),
            remaining_balance: dollars(50000),
            existing_paid_amount: Decimal::ZERO,
            requires_full_payment: false,
        };
        let resolved =
            ResolvedAmounts::resolve(&inv, None, Some(&info), Some(&AmountSelection::Preset25));
        assert_eq!(resolved.payable_amount, Some(dollars(12500)));
        assert!(resolved.is_amount_valid());

        let presets = resolved.offered_presets();
        let values: Vec<Decimal> = presets.iter().map(|(_, v)| *v).collect();
        assert!(values.contains(&dollars(12500)));
        assert!(values.contains(&dollars(25000)));
        assert!(values.contains(&dollars(37500)));
        assert!(values.contains(&dollars(50000)));
    }

    #[test]
    fn presets_below_minimum_are_gated() {
        let inv = invoice(dollars(50000));
        let info = MinimumPaymentInfo {
            minimum_payment: dollars(20000),
            remaining_balance: dollars(50000),
            existing_paid_amount: Decimal::ZERO,
            requires_full_payment: false,
        };
        let resolved = ResolvedAmounts::resolve(&inv, None, Some(&info), None);
        for (_, value) in resolved.offered_presets() {
            assert!(value >= dollars(20000), "offered preset {value} below minimum");
        }
    }

    #[test]
    fn requires_full_payment_forces_remaining() {
        let inv = invoice(dollars(50000));
        let info = MinimumPaymentInfo {
            minimum_payment: dollars(10000),
            remaining_balance: dollars(10000),
            existing_paid_amount: dollars(40000),
            requires_full_payment: true,
        };
        // Even an attempted half-balance custom entry resolves to the full
        // balance, with the rule surfaced as the invalid reason.
        let resolved = ResolvedAmounts::resolve(
            &inv,
            None,
            Some(&info),
            Some(&AmountSelection::Custom(dollars(5000))),
        );
        assert_eq!(resolved.payable_amount, Some(dollars(10000)));
        assert!(!resolved.is_amount_valid());
        let reason = resolved.invalid_reason.expect("mismatch must be reported");
        assert_eq!(
            reason.to_string(),
            "This payment must be the full remaining balance of $100.00"
        );
    }

    #[test]
    fn full_balance_custom_within_tolerance_accepted() {
        let inv = invoice(dollars(50000));
        let info = MinimumPaymentInfo {
            minimum_payment: dollars(10000),
            remaining_balance: dollars(10000),
            existing_paid_amount: dollars(40000),
            requires_full_payment: true,
        };
        let resolved = ResolvedAmounts::resolve(
            &inv,
            None,
            Some(&info),
            Some(&AmountSelection::Custom(dollars(9999))),
        );
        assert!(resolved.invalid_reason.is_none());
        assert!(resolved.is_amount_valid());
    }

    #[test]
    fn remaining_below_minimum_forces_full() {
        let inv = invoice(dollars(5000));
        let info = MinimumPaymentInfo {
            minimum_payment: dollars(10000),
            remaining_balance: dollars(5000),
            existing_paid_amount: Decimal::ZERO,
            requires_full_payment: false,
        };
        let resolved = ResolvedAmounts::resolve(&inv, None, Some(&info), None);
        assert!(resolved.full_payment_only);
        assert_eq!(resolved.payable_amount, Some(dollars(5000)));
        assert!(resolved.is_amount_valid());
        assert_eq!(
            resolved.offered_presets(),
            vec![(AmountSelection::Full, dollars(5000))]
        );
    }

    #[test]
    fn custom_amount_bounds() {
        let inv = invoice(dollars(50000));
        let info = MinimumPaymentInfo {
            minimum_payment: dollars(10000),
            remaining_balance: dollars(40000),
            existing_paid_amount: dollars(10000),
            requires_full_payment: false,
        };
        let check = |cents: i64| {
            ResolvedAmounts::resolve(
                &inv,
                None,
                Some(&info),
                Some(&AmountSelection::Custom(dollars(cents))),
            )
        };
        assert!(matches!(
            check(0).invalid_reason,
            Some(AmountInvalidReason::NotPositive)
        ));
        assert!(matches!(
            check(5000).invalid_reason,
            Some(AmountInvalidReason::BelowMinimum { .. })
        ));
        assert!(matches!(
            check(45000).invalid_reason,
            Some(AmountInvalidReason::ExceedsBalance { .. })
        ));
        assert!(matches!(
            check(60000).invalid_reason,
            Some(AmountInvalidReason::ExceedsInvoiceTotal { .. })
        ));
        assert!(check(20000).is_amount_valid());
    }

    #[test]
    fn no_selection_is_invalid_but_balances_resolve() {
        let inv = invoice(dollars(50000));
        let resolved = ResolvedAmounts::resolve(&inv, None, None, None);
        assert!(!resolved.is_amount_valid());
        assert_eq!(
            resolved.invalid_reason,
            Some(AmountInvalidReason::NoSelection)
        );
        assert_eq!(resolved.remaining_balance, dollars(50000));
    }

    #[test]
    fn payable_never_exceeds_bounds() {
        // Property 1 across a spread of selections.
        let inv = invoice(dollars(50000));
        let info = MinimumPaymentInfo {
            minimum_payment: dollars(10000),
            remaining_balance: dollars(40000),
            existing_paid_amount: dollars(10000),
            requires_full_payment: false,
        };
        for sel in [
            AmountSelection::Preset25,
            AmountSelection::Preset50,
            AmountSelection::Preset75,
            AmountSelection::Minimum,
            AmountSelection::Full,
        ] {
            let resolved = ResolvedAmounts::resolve(&inv, None, Some(&info), Some(&sel));
            if resolved.is_amount_valid() {
                let amount = resolved.payable_amount.expect("valid implies resolved");
                assert!(amount >= resolved.minimum_payment);
                assert!(amount <= resolved.remaining_balance);
                assert!(amount <= inv.total);
            }
        }
    }
}
