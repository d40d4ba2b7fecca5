//! Business-invariant checks for a proposed settlement.

use rust_decimal::Decimal;

use clinipay_billing::CreditId;
use clinipay_core::money::epsilon;

use crate::error::{Result, SettlementError};
use crate::request::ManualPayment;

/// One credit application with its converted value, ready for validation.
#[derive(Debug, Clone)]
pub struct CreditLine {
    pub credit_id: CreditId,
    /// Requested amount, in the credit's own currency.
    pub requested: Decimal,
    /// Balance available, in the credit's own currency.
    pub available: Decimal,
    /// Requested amount converted into the invoice currency.
    pub converted: Decimal,
}

/// Enforces the settlement invariants against a proposed settlement.
///
/// Runs after conversion and strictly before any mutation: a failure here
/// aborts the attempt with zero state change.
#[derive(Debug, Default)]
pub struct SettlementValidator;

impl SettlementValidator {
    /// Check a proposed settlement against the invoice's remaining balance.
    ///
    /// `remaining_balance`, `line.converted` and `manual_converted` are all in
    /// the invoice currency. The combined credits-plus-manual check is applied
    /// unconditionally, whether the manual amount is zero, positive, or
    /// absent.
    pub fn validate(
        &self,
        remaining_balance: Decimal,
        lines: &[CreditLine],
        manual: Option<&ManualPayment>,
        manual_converted: Decimal,
    ) -> Result<()> {
        let manual_amount = manual.map(|m| m.amount).unwrap_or(Decimal::ZERO);

        if manual_amount < Decimal::ZERO {
            return Err(SettlementError::Validation(
                "manual payment amount cannot be negative".to_string(),
            ));
        }
        if lines.is_empty() && manual_amount <= Decimal::ZERO {
            return Err(SettlementError::EmptySettlement);
        }

        for line in lines {
            if line.requested <= Decimal::ZERO {
                return Err(SettlementError::Validation(format!(
                    "credit application {} amount must be positive",
                    line.credit_id
                )));
            }
            if line.requested > line.available + epsilon() {
                return Err(SettlementError::InsufficientCredit {
                    credit_id: line.credit_id,
                    requested: line.requested,
                    available: line.available,
                });
            }
        }

        let credits_total: Decimal = lines.iter().map(|l| l.converted).sum();
        if credits_total > remaining_balance + epsilon() {
            return Err(SettlementError::OverAllocatedCredits {
                credits_total,
                remaining_balance,
            });
        }

        let attempted = credits_total + manual_converted;
        if attempted > remaining_balance + epsilon() {
            return Err(SettlementError::Overpayment {
                attempted,
                remaining_balance,
            });
        }

        if manual_amount > Decimal::ZERO && manual.and_then(|m| m.method.as_ref()).is_none() {
            return Err(SettlementError::MissingPaymentMethod);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clinipay_billing::PaymentMethodId;
    use clinipay_core::AggregateId;
    use clinipay_core::money::Currency;
    use rust_decimal_macros::dec;

    fn line(requested: Decimal, available: Decimal, converted: Decimal) -> CreditLine {
        CreditLine {
            credit_id: CreditId::new(AggregateId::new()),
            requested,
            available,
            converted,
        }
    }

    fn manual(amount: Decimal, method: Option<&str>) -> ManualPayment {
        ManualPayment {
            amount,
            currency: Currency::Usd,
            method: method.map(PaymentMethodId::new),
            date: Utc::now(),
        }
    }

    #[test]
    fn empty_settlement_is_rejected() {
        let validator = SettlementValidator;
        assert_eq!(
            validator
                .validate(dec!(100), &[], None, dec!(0))
                .unwrap_err(),
            SettlementError::EmptySettlement
        );

        // A zero manual amount alone is still an empty settlement.
        let zero = manual(dec!(0), None);
        assert_eq!(
            validator
                .validate(dec!(100), &[], Some(&zero), dec!(0))
                .unwrap_err(),
            SettlementError::EmptySettlement
        );
    }

    #[test]
    fn negative_manual_amount_is_rejected() {
        let validator = SettlementValidator;
        let negative = manual(dec!(-10), Some("cash"));
        assert!(matches!(
            validator
                .validate(dec!(100), &[], Some(&negative), dec!(-10))
                .unwrap_err(),
            SettlementError::Validation(_)
        ));
    }

    #[test]
    fn credit_exceeding_its_balance_is_rejected() {
        let validator = SettlementValidator;
        let lines = [line(dec!(40), dec!(30), dec!(40))];
        assert!(matches!(
            validator
                .validate(dec!(100), &lines, None, dec!(0))
                .unwrap_err(),
            SettlementError::InsufficientCredit { .. }
        ));
    }

    #[test]
    fn credits_beyond_remaining_balance_are_rejected() {
        let validator = SettlementValidator;
        let lines = [line(dec!(2400), dec!(2400), dec!(60))];
        match validator
            .validate(dec!(50), &lines, None, dec!(0))
            .unwrap_err()
        {
            SettlementError::OverAllocatedCredits {
                credits_total,
                remaining_balance,
            } => {
                assert_eq!(credits_total, dec!(60));
                assert_eq!(remaining_balance, dec!(50));
            }
            other => panic!("expected OverAllocatedCredits, got {other:?}"),
        }
    }

    #[test]
    fn combined_check_applies_with_positive_manual_amount() {
        let validator = SettlementValidator;
        let lines = [line(dec!(30), dec!(30), dec!(30))];
        let tender = manual(dec!(80), Some("cash"));
        match validator
            .validate(dec!(100), &lines, Some(&tender), dec!(80))
            .unwrap_err()
        {
            SettlementError::Overpayment {
                attempted,
                remaining_balance,
            } => {
                assert_eq!(attempted, dec!(110));
                assert_eq!(remaining_balance, dec!(100));
            }
            other => panic!("expected Overpayment, got {other:?}"),
        }
    }

    #[test]
    fn positive_manual_amount_requires_a_method() {
        let validator = SettlementValidator;
        let tender = manual(dec!(70), None);
        assert_eq!(
            validator
                .validate(dec!(100), &[], Some(&tender), dec!(70))
                .unwrap_err(),
            SettlementError::MissingPaymentMethod
        );
    }

    #[test]
    fn zero_manual_amount_needs_no_method_when_credits_cover() {
        let validator = SettlementValidator;
        let lines = [line(dec!(40), dec!(40), dec!(40))];
        let zero = manual(dec!(0), None);
        assert!(
            validator
                .validate(dec!(40), &lines, Some(&zero), dec!(0))
                .is_ok()
        );
    }

    #[test]
    fn exact_settlement_within_epsilon_is_accepted() {
        let validator = SettlementValidator;
        let lines = [line(dec!(30), dec!(30), dec!(30))];
        let tender = manual(dec!(70.005), Some("cash"));
        assert!(
            validator
                .validate(dec!(100), &lines, Some(&tender), dec!(70.005))
                .is_ok()
        );
    }
}
