//! The settlement engine.
//!
//! Orchestrates snapshot load, currency conversion, validation, credit
//! consumption and the atomic compare-and-commit into one operation.

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;

use clinipay_billing::{
    Credit, CreditConsumption, Invoice, PaymentId, PaymentRecord,
};
use clinipay_core::money::{Currency, ExchangeRate, Money};
use clinipay_core::{AggregateId, AggregateRoot, ExpectedVersion, PayerId};

use crate::collaborators::{CashSession, CashSessionService, CreditSourceService, PaymentMethodCatalog};
use crate::error::{Result, SettlementError};
use crate::ledger::CreditLedger;
use crate::request::SettlementRequest;
use crate::store::{SettlementCommit, SettlementStore};
use crate::validator::{CreditLine, SettlementValidator};

/// Successful settlement output: the authoritative post-commit state.
///
/// Carries everything the caller needs to refresh its view — no follow-up
/// read, and no race window between commit and that read.
#[derive(Debug, Clone)]
pub struct SettlementResult {
    pub invoice: Invoice,
    pub consumed_credits: Vec<Credit>,
    pub consumptions: Vec<CreditConsumption>,
    pub payment_record: Option<PaymentRecord>,
    /// Total applied to the invoice, in the invoice currency.
    pub total_applied: Decimal,
}

/// Settlement engine.
///
/// Holds no per-settlement state; every call works purely off the request and
/// a fresh snapshot. Collaborators are trait-bound so tests and the hosting
/// application can supply their own.
pub struct SettlementEngine<S, C, R, M> {
    store: S,
    sessions: C,
    credit_sources: R,
    payment_methods: M,
    validator: SettlementValidator,
}

impl<S, C, R, M> SettlementEngine<S, C, R, M>
where
    S: SettlementStore,
    C: CashSessionService,
    R: CreditSourceService,
    M: PaymentMethodCatalog,
{
    pub fn new(store: S, sessions: C, credit_sources: R, payment_methods: M) -> Self {
        Self {
            store,
            sessions,
            credit_sources,
            payment_methods,
            validator: SettlementValidator,
        }
    }

    /// Credits a caller can draw from when building a request.
    pub fn available_credits(&self, payer_id: PayerId) -> Result<Vec<Credit>> {
        let credits = self.credit_sources.credits_for(payer_id)?;
        Ok(credits.into_iter().filter(|c| c.has_balance()).collect())
    }

    /// Apply a settlement atomically: all of it commits, or none of it does.
    ///
    /// Steps: resolve the session, load a consistent snapshot, convert all
    /// amounts into the invoice currency, validate, consume credits and move
    /// the invoice's paid amount, then compare-and-commit. A stale snapshot
    /// fails with `ConcurrencyConflict` and zero mutation; the caller may
    /// retry with fresh state.
    pub fn settle(&self, request: &SettlementRequest) -> Result<SettlementResult> {
        tracing::debug!(
            invoice_id = %request.invoice_id,
            credit_applications = request.credit_applications.len(),
            manual_amount = %request.manual_amount(),
            "settlement attempt"
        );

        let session = self.sessions.session(request.session_id)?;
        Self::check_request_shape(request)?;

        let credit_ids = request.credit_ids();
        let snapshot = self.store.load_snapshot(request.invoice_id, &credit_ids)?;

        let mut invoice = snapshot.invoice;
        let invoice_expected = ExpectedVersion::Exact(invoice.version());
        let credit_expected: Vec<ExpectedVersion> = snapshot
            .credits
            .iter()
            .map(|c| ExpectedVersion::Exact(c.version()))
            .collect();

        let invoice_currency = invoice.currency();
        let remaining_balance = invoice.remaining_balance();

        let rate = resolve_rate(request, &session, &snapshot.credits, invoice_currency)?;

        // Convert every application and the manual amount into the invoice
        // currency before validating anything against the remaining balance.
        let mut lines = Vec::with_capacity(request.credit_applications.len());
        for application in &request.credit_applications {
            let credit = snapshot
                .credits
                .iter()
                .find(|c| c.id_typed() == application.credit_id)
                .ok_or_else(|| {
                    SettlementError::Validation(format!(
                        "unknown credit {}",
                        application.credit_id
                    ))
                })?;
            let converted =
                convert_amount(application.amount, credit.currency(), invoice_currency, rate)?;
            lines.push(CreditLine {
                credit_id: application.credit_id,
                requested: application.amount,
                available: credit.available_balance(),
                converted,
            });
        }

        let manual = request.manual_payment.as_ref();
        let manual_converted = match manual {
            Some(m) if m.amount != Decimal::ZERO => {
                convert_amount(m.amount, m.currency, invoice_currency, rate)?
            }
            _ => Decimal::ZERO,
        };

        self.validator
            .validate(remaining_balance, &lines, manual, manual_converted)?;

        if let Some(m) = manual {
            if m.amount > Decimal::ZERO {
                // Presence was validated above; membership is checked here.
                let method = m.method.as_ref().ok_or(SettlementError::MissingPaymentMethod)?;
                if !self.payment_methods.contains(method) {
                    return Err(SettlementError::Validation(format!(
                        "unknown payment method {method}"
                    )));
                }
            }
        }

        // Every balance change flows through the ledger.
        let occurred_at = Utc::now();
        let mut ledger = CreditLedger::new(snapshot.credits);
        let mut consumptions = Vec::with_capacity(lines.len());
        for line in &lines {
            consumptions.push(ledger.apply(line.credit_id, line.requested, occurred_at)?);
        }

        let credits_total: Decimal = lines.iter().map(|l| l.converted).sum();
        let total_applied = credits_total + manual_converted;
        invoice.apply_settlement(total_applied)?;

        let payment_record = match manual {
            Some(m) if m.amount > Decimal::ZERO => {
                let method = m.method.clone().ok_or(SettlementError::MissingPaymentMethod)?;
                Some(PaymentRecord {
                    id: PaymentId::new(AggregateId::new()),
                    invoice_id: request.invoice_id,
                    amount: m.amount,
                    currency: m.currency,
                    method,
                    date: m.date,
                    exchange_rate_used: if m.currency == invoice_currency { None } else { rate },
                    converted_amount: manual_converted,
                })
            }
            _ => None,
        };

        let consumed_credits = ledger.into_credits();
        // Snapshot order is preserved through the ledger, so the expected
        // versions line up with the updated entities.
        let commit_credits: Vec<(Credit, ExpectedVersion)> = consumed_credits
            .iter()
            .cloned()
            .zip(credit_expected)
            .collect();

        self.store.commit(SettlementCommit {
            invoice: invoice.clone(),
            invoice_expected,
            credits: commit_credits,
            consumptions: consumptions.clone(),
            payment: payment_record.clone(),
        })?;

        tracing::info!(
            invoice_id = %request.invoice_id,
            %total_applied,
            status = ?invoice.payment_status(),
            "settlement committed"
        );

        Ok(SettlementResult {
            invoice,
            consumed_credits,
            consumptions,
            payment_record,
            total_applied,
        })
    }

    fn check_request_shape(request: &SettlementRequest) -> Result<()> {
        let mut seen = HashSet::new();
        for application in &request.credit_applications {
            if !seen.insert(application.credit_id) {
                return Err(SettlementError::Validation(format!(
                    "credit {} applied more than once",
                    application.credit_id
                )));
            }
        }
        Ok(())
    }
}

/// Pick the rate for this settlement: request override first, then the
/// session default. Only fails when a conversion is actually required.
fn resolve_rate(
    request: &SettlementRequest,
    session: &CashSession,
    credits: &[Credit],
    invoice_currency: Currency,
) -> Result<Option<ExchangeRate>> {
    let foreign = credits
        .iter()
        .map(|c| c.currency())
        .chain(
            request
                .manual_payment
                .iter()
                .filter(|m| m.amount != Decimal::ZERO)
                .map(|m| m.currency),
        )
        .find(|c| *c != invoice_currency);

    match request.exchange_rate.or(session.default_exchange_rate) {
        Some(rate) => Ok(Some(rate)),
        None => match foreign {
            Some(from) => Err(SettlementError::MissingExchangeRate {
                from,
                to: invoice_currency,
            }),
            None => Ok(None),
        },
    }
}

/// Convert an amount between currencies; identity needs no rate.
fn convert_amount(
    amount: Decimal,
    from: Currency,
    to: Currency,
    rate: Option<ExchangeRate>,
) -> Result<Decimal> {
    if from == to {
        return Ok(amount);
    }
    let rate = rate.ok_or(SettlementError::MissingExchangeRate { from, to })?;
    Ok(rate.convert(Money::new(amount, from), to).amount)
}
