//! Storage contract: snapshot load + compare-and-commit.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use clinipay_billing::{Credit, CreditConsumption, CreditId, Invoice, InvoiceId, PaymentRecord};
use clinipay_core::{AggregateRoot, ExpectedVersion};

use crate::error::{Result, SettlementError};

/// One consistent read of an invoice and the credits a settlement references.
#[derive(Debug, Clone)]
pub struct SettlementSnapshot {
    pub invoice: Invoice,
    pub credits: Vec<Credit>,
}

/// The atomic write produced by an accepted settlement.
///
/// Expected versions are captured at snapshot time; a mismatch at commit time
/// means another settlement landed in between.
#[derive(Debug, Clone)]
pub struct SettlementCommit {
    pub invoice: Invoice,
    pub invoice_expected: ExpectedVersion,
    pub credits: Vec<(Credit, ExpectedVersion)>,
    pub consumptions: Vec<CreditConsumption>,
    pub payment: Option<PaymentRecord>,
}

/// Load-snapshot and commit operations with a compare-and-commit contract.
///
/// `commit` must verify every expected version against current stored state
/// and persist the invoice update, credit decrements, consumption records and
/// payment record as one unit. A stale snapshot fails with
/// [`SettlementError::ConcurrencyConflict`] and zero mutation.
pub trait SettlementStore: Send + Sync {
    fn load_snapshot(
        &self,
        invoice_id: InvoiceId,
        credit_ids: &[CreditId],
    ) -> Result<SettlementSnapshot>;

    fn commit(&self, commit: SettlementCommit) -> Result<()>;
}

impl<S> SettlementStore for Arc<S>
where
    S: SettlementStore + ?Sized,
{
    fn load_snapshot(
        &self,
        invoice_id: InvoiceId,
        credit_ids: &[CreditId],
    ) -> Result<SettlementSnapshot> {
        (**self).load_snapshot(invoice_id, credit_ids)
    }

    fn commit(&self, commit: SettlementCommit) -> Result<()> {
        (**self).commit(commit)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    invoices: HashMap<InvoiceId, Invoice>,
    credits: HashMap<CreditId, Credit>,
    consumptions: Vec<CreditConsumption>,
    payments: Vec<PaymentRecord>,
}

/// In-memory settlement store.
///
/// Intended for tests/dev; production backends implement the same trait over
/// a transactional database. The single `RwLock` makes every commit
/// all-or-nothing and serializes writers.
#[derive(Debug, Default)]
pub struct InMemorySettlementStore {
    state: RwLock<StoreState>,
}

impl InMemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an invoice (settlement itself never creates invoices).
    pub fn insert_invoice(&self, invoice: Invoice) -> Result<()> {
        let mut state = self.write()?;
        state.invoices.insert(invoice.id_typed(), invoice);
        Ok(())
    }

    /// Seed a credit (issuance is external to the engine).
    pub fn insert_credit(&self, credit: Credit) -> Result<()> {
        let mut state = self.write()?;
        state.credits.insert(credit.id_typed(), credit);
        Ok(())
    }

    pub fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        Ok(self.read()?.invoices.get(&id).cloned())
    }

    pub fn credit(&self, id: CreditId) -> Result<Option<Credit>> {
        Ok(self.read()?.credits.get(&id).cloned())
    }

    /// Audit trail of consumptions for one credit, in commit order.
    pub fn consumptions_for(&self, credit_id: CreditId) -> Result<Vec<CreditConsumption>> {
        Ok(self
            .read()?
            .consumptions
            .iter()
            .filter(|c| c.credit_id == credit_id)
            .cloned()
            .collect())
    }

    /// Payment records appended for one invoice, in commit order.
    pub fn payments_for(&self, invoice_id: InvoiceId) -> Result<Vec<PaymentRecord>> {
        Ok(self
            .read()?
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| SettlementError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| SettlementError::Storage("lock poisoned".to_string()))
    }

    fn check_version(entity: &str, expected: ExpectedVersion, actual: u64) -> Result<()> {
        if expected.matches(actual) {
            return Ok(());
        }
        let expected = match expected {
            ExpectedVersion::Exact(v) => v,
            ExpectedVersion::Any => actual,
        };
        Err(SettlementError::ConcurrencyConflict {
            entity: entity.to_string(),
            expected,
            actual,
        })
    }
}

impl SettlementStore for InMemorySettlementStore {
    fn load_snapshot(
        &self,
        invoice_id: InvoiceId,
        credit_ids: &[CreditId],
    ) -> Result<SettlementSnapshot> {
        let state = self.read()?;

        let invoice = state
            .invoices
            .get(&invoice_id)
            .cloned()
            .ok_or_else(|| SettlementError::Validation(format!("unknown invoice {invoice_id}")))?;

        let mut credits = Vec::with_capacity(credit_ids.len());
        for id in credit_ids {
            let credit = state
                .credits
                .get(id)
                .cloned()
                .ok_or_else(|| SettlementError::Validation(format!("unknown credit {id}")))?;
            credits.push(credit);
        }

        Ok(SettlementSnapshot { invoice, credits })
    }

    fn commit(&self, commit: SettlementCommit) -> Result<()> {
        let mut state = self.write()?;

        // Verify every expected version before touching anything.
        let invoice_id = commit.invoice.id_typed();
        let current = state
            .invoices
            .get(&invoice_id)
            .ok_or_else(|| SettlementError::Validation(format!("unknown invoice {invoice_id}")))?;
        Self::check_version("invoice", commit.invoice_expected, current.version())?;

        for (credit, expected) in &commit.credits {
            let id = credit.id_typed();
            let current = state
                .credits
                .get(&id)
                .ok_or_else(|| SettlementError::Validation(format!("unknown credit {id}")))?;
            Self::check_version("credit", *expected, current.version())?;
        }

        // All checks passed; persist as one unit under the write lock.
        state.invoices.insert(invoice_id, commit.invoice);
        for (credit, _) in commit.credits {
            state.credits.insert(credit.id_typed(), credit);
        }
        state.consumptions.extend(commit.consumptions);
        if let Some(payment) = commit.payment {
            state.payments.push(payment);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinipay_billing::CreditKind;
    use clinipay_core::money::Currency;
    use clinipay_core::{AggregateId, PayerId};
    use rust_decimal_macros::dec;

    fn seeded_store() -> (InMemorySettlementStore, InvoiceId, CreditId) {
        let store = InMemorySettlementStore::new();
        let payer = PayerId::new();

        let invoice = Invoice::new(
            InvoiceId::new(AggregateId::new()),
            payer,
            Currency::Usd,
            dec!(100),
            dec!(0),
            0,
        )
        .unwrap();
        let invoice_id = invoice.id_typed();
        store.insert_invoice(invoice).unwrap();

        let credit = Credit::new(
            CreditId::new(AggregateId::new()),
            payer,
            CreditKind::CreditNote,
            Currency::Usd,
            dec!(30),
            0,
        )
        .unwrap();
        let credit_id = credit.id_typed();
        store.insert_credit(credit).unwrap();

        (store, invoice_id, credit_id)
    }

    #[test]
    fn snapshot_returns_invoice_and_referenced_credits() {
        let (store, invoice_id, credit_id) = seeded_store();
        let snapshot = store.load_snapshot(invoice_id, &[credit_id]).unwrap();
        assert_eq!(snapshot.invoice.id_typed(), invoice_id);
        assert_eq!(snapshot.credits.len(), 1);
        assert_eq!(snapshot.credits[0].id_typed(), credit_id);
    }

    #[test]
    fn snapshot_of_unknown_invoice_fails() {
        let (store, _, _) = seeded_store();
        let missing = InvoiceId::new(AggregateId::new());
        assert!(matches!(
            store.load_snapshot(missing, &[]).unwrap_err(),
            SettlementError::Validation(_)
        ));
    }

    #[test]
    fn stale_invoice_version_is_a_concurrency_conflict() {
        let (store, invoice_id, credit_id) = seeded_store();
        let snapshot = store.load_snapshot(invoice_id, &[credit_id]).unwrap();

        let mut first = snapshot.invoice.clone();
        first.apply_settlement(dec!(10)).unwrap();
        store
            .commit(SettlementCommit {
                invoice: first,
                invoice_expected: ExpectedVersion::Exact(0),
                credits: vec![],
                consumptions: vec![],
                payment: None,
            })
            .unwrap();

        // Second commit from the same (now stale) snapshot must fail.
        let mut second = snapshot.invoice;
        second.apply_settlement(dec!(20)).unwrap();
        let err = store
            .commit(SettlementCommit {
                invoice: second,
                invoice_expected: ExpectedVersion::Exact(0),
                credits: vec![],
                consumptions: vec![],
                payment: None,
            })
            .unwrap_err();

        assert!(matches!(
            err,
            SettlementError::ConcurrencyConflict { expected: 0, actual: 1, .. }
        ));
        assert!(err.is_retryable());

        // The first commit is the only one that landed.
        let stored = store.invoice(invoice_id).unwrap().unwrap();
        assert_eq!(stored.paid_amount(), dec!(10));
    }

    #[test]
    fn failed_commit_mutates_nothing() {
        let (store, invoice_id, credit_id) = seeded_store();
        let snapshot = store.load_snapshot(invoice_id, &[credit_id]).unwrap();

        let mut invoice = snapshot.invoice;
        invoice.apply_settlement(dec!(30)).unwrap();
        let mut credit = snapshot.credits.into_iter().next().unwrap();
        let consumption = credit.consume(dec!(30), chrono::Utc::now()).unwrap();

        // Stale credit expectation fails the whole commit, invoice included.
        let err = store
            .commit(SettlementCommit {
                invoice,
                invoice_expected: ExpectedVersion::Exact(0),
                credits: vec![(credit, ExpectedVersion::Exact(7))],
                consumptions: vec![consumption],
                payment: None,
            })
            .unwrap_err();
        assert!(matches!(err, SettlementError::ConcurrencyConflict { .. }));

        let stored_invoice = store.invoice(invoice_id).unwrap().unwrap();
        assert_eq!(stored_invoice.paid_amount(), dec!(0));
        let stored_credit = store.credit(credit_id).unwrap().unwrap();
        assert_eq!(stored_credit.available_balance(), dec!(30));
        assert!(store.consumptions_for(credit_id).unwrap().is_empty());
    }
}
