//! Settlement request types.
//!
//! A request is a single immutable value the caller constructs once from
//! collaborator data (available credits, session rate, method catalog) and
//! passes whole into the engine. In-progress selections live with the caller;
//! the engine keeps no per-settlement mutable state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clinipay_billing::{CreditId, InvoiceId, PaymentMethodId};
use clinipay_core::SessionId;
use clinipay_core::money::{Currency, ExchangeRate};

/// One credit to draw from, with the amount in the credit's own currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditApplication {
    pub credit_id: CreditId,
    pub amount: Decimal,
}

/// The manual tender accompanying a settlement, if any.
///
/// A zero amount is valid when credits cover the invoice; `method` is only
/// required when the amount is positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPayment {
    pub amount: Decimal,
    pub currency: Currency,
    pub method: Option<PaymentMethodId>,
    pub date: DateTime<Utc>,
}

/// The sole mutation entry point of the settlement engine.
///
/// `exchange_rate` overrides the session default for this settlement only.
/// The engine never reads a background or global rate, so each settlement's
/// math is deterministic and auditable after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub invoice_id: InvoiceId,
    pub session_id: SessionId,
    pub credit_applications: Vec<CreditApplication>,
    pub manual_payment: Option<ManualPayment>,
    pub exchange_rate: Option<ExchangeRate>,
}

impl SettlementRequest {
    /// The credits this request references, in application order.
    pub fn credit_ids(&self) -> Vec<CreditId> {
        self.credit_applications
            .iter()
            .map(|a| a.credit_id)
            .collect()
    }

    /// The manual amount; zero when no tender accompanies the request.
    pub fn manual_amount(&self) -> Decimal {
        self.manual_payment
            .as_ref()
            .map(|m| m.amount)
            .unwrap_or(Decimal::ZERO)
    }
}
