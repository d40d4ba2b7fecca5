//! Credit ledger: the single path through which credit balances shrink.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use clinipay_billing::{Credit, CreditConsumption, CreditId};
use clinipay_core::money::epsilon;

use crate::error::{Result, SettlementError};

/// Tracks the credits involved in one settlement and consumes their balances.
///
/// Built from the store snapshot; the updated entities are handed back to the
/// store at commit time. No other code mutates a credit balance, so every
/// change is serialized through the same commit path.
#[derive(Debug)]
pub struct CreditLedger {
    credits: HashMap<CreditId, Credit>,
    // Snapshot order, so the commit sees credits in a stable order.
    order: Vec<CreditId>,
}

impl CreditLedger {
    pub fn new(credits: Vec<Credit>) -> Self {
        let order: Vec<CreditId> = credits.iter().map(|c| c.id_typed()).collect();
        let credits = credits.into_iter().map(|c| (c.id_typed(), c)).collect();
        Self { credits, order }
    }

    /// Credits that still carry a positive balance.
    pub fn list_available(&self) -> Vec<&Credit> {
        self.order
            .iter()
            .filter_map(|id| self.credits.get(id))
            .filter(|c| c.has_balance())
            .collect()
    }

    pub fn get(&self, credit_id: CreditId) -> Option<&Credit> {
        self.credits.get(&credit_id)
    }

    /// Consume `amount` (in the credit's own currency) from one credit.
    ///
    /// Fails with `InsufficientCredit` when the amount exceeds the available
    /// balance beyond epsilon, and `Validation` for unknown credits or
    /// non-positive amounts. On success the balance is decremented and the
    /// immutable consumption record returned.
    pub fn apply(
        &mut self,
        credit_id: CreditId,
        amount: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> Result<CreditConsumption> {
        let credit = self
            .credits
            .get_mut(&credit_id)
            .ok_or_else(|| SettlementError::Validation(format!("unknown credit {credit_id}")))?;

        if amount <= Decimal::ZERO {
            return Err(SettlementError::Validation(
                "credit application amount must be positive".to_string(),
            ));
        }
        if amount > credit.available_balance() + epsilon() {
            return Err(SettlementError::InsufficientCredit {
                credit_id,
                requested: amount,
                available: credit.available_balance(),
            });
        }

        Ok(credit.consume(amount, occurred_at)?)
    }

    /// Hand back the (possibly updated) credit entities in snapshot order.
    pub fn into_credits(self) -> Vec<Credit> {
        let Self { mut credits, order } = self;
        order.iter().filter_map(|id| credits.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinipay_billing::CreditKind;
    use clinipay_core::money::Currency;
    use clinipay_core::{AggregateId, PayerId};
    use rust_decimal_macros::dec;

    fn test_credit(balance: Decimal) -> Credit {
        Credit::new(
            CreditId::new(AggregateId::new()),
            PayerId::new(),
            CreditKind::CreditNote,
            Currency::Usd,
            balance,
            0,
        )
        .unwrap()
    }

    #[test]
    fn apply_decrements_and_records() {
        let credit = test_credit(dec!(30));
        let id = credit.id_typed();
        let mut ledger = CreditLedger::new(vec![credit]);

        let consumption = ledger.apply(id, dec!(30), Utc::now()).unwrap();
        assert_eq!(consumption.amount, dec!(30));
        assert_eq!(consumption.resulting_balance, dec!(0));
        assert_eq!(ledger.get(id).unwrap().available_balance(), dec!(0));
    }

    #[test]
    fn no_double_spend_once_exhausted() {
        let credit = test_credit(dec!(30));
        let id = credit.id_typed();
        let mut ledger = CreditLedger::new(vec![credit]);

        ledger.apply(id, dec!(30), Utc::now()).unwrap();
        let err = ledger.apply(id, dec!(0.02), Utc::now()).unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientCredit { .. }));
    }

    #[test]
    fn over_balance_application_carries_quantities() {
        let credit = test_credit(dec!(30));
        let id = credit.id_typed();
        let mut ledger = CreditLedger::new(vec![credit]);

        match ledger.apply(id, dec!(45), Utc::now()).unwrap_err() {
            SettlementError::InsufficientCredit {
                credit_id,
                requested,
                available,
            } => {
                assert_eq!(credit_id, id);
                assert_eq!(requested, dec!(45));
                assert_eq!(available, dec!(30));
            }
            other => panic!("expected InsufficientCredit, got {other:?}"),
        }
        // Rejected application leaves the balance untouched.
        assert_eq!(ledger.get(id).unwrap().available_balance(), dec!(30));
    }

    #[test]
    fn unknown_credit_and_non_positive_amounts_fail_validation() {
        let mut ledger = CreditLedger::new(vec![test_credit(dec!(10))]);
        let unknown = CreditId::new(AggregateId::new());
        assert!(matches!(
            ledger.apply(unknown, dec!(5), Utc::now()).unwrap_err(),
            SettlementError::Validation(_)
        ));

        let id = ledger.list_available()[0].id_typed();
        assert!(matches!(
            ledger.apply(id, dec!(0), Utc::now()).unwrap_err(),
            SettlementError::Validation(_)
        ));
    }

    #[test]
    fn list_available_excludes_exhausted_credits() {
        let kept = test_credit(dec!(10));
        let spent = test_credit(dec!(5));
        let spent_id = spent.id_typed();
        let mut ledger = CreditLedger::new(vec![kept, spent]);

        ledger.apply(spent_id, dec!(5), Utc::now()).unwrap();

        let available = ledger.list_available();
        assert_eq!(available.len(), 1);
        assert_ne!(available[0].id_typed(), spent_id);
    }
}
