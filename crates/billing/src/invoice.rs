use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clinipay_core::money::{Currency, epsilon};
use clinipay_core::{AggregateId, AggregateRoot, DomainError, DomainResult, PayerId};

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Payment status derived from paid/total amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Project the status from paid/total amounts.
    ///
    /// Epsilon-tolerant at both ends: a payment within one cent of the total
    /// counts as paid, and a paid amount within one cent of zero counts as
    /// unpaid.
    pub fn project(paid_amount: Decimal, total: Decimal) -> Self {
        if paid_amount >= total - epsilon() {
            PaymentStatus::Paid
        } else if paid_amount <= epsilon() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::Partial
        }
    }
}

/// Aggregate root: Invoice.
///
/// Created and later booked by the ordering subsystem; the settlement engine
/// only moves `paid_amount` forward and reprojects `payment_status`. It never
/// creates or deletes invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    payer_id: PayerId,
    currency: Currency,
    total: Decimal,
    paid_amount: Decimal,
    payment_status: PaymentStatus,
    version: u64,
}

impl Invoice {
    /// Rehydrate an invoice from stored state.
    ///
    /// Invariant: `0 <= paid_amount <= total` (within epsilon).
    pub fn new(
        id: InvoiceId,
        payer_id: PayerId,
        currency: Currency,
        total: Decimal,
        paid_amount: Decimal,
        version: u64,
    ) -> DomainResult<Self> {
        if total < Decimal::ZERO {
            return Err(DomainError::validation("invoice total cannot be negative"));
        }
        if paid_amount < -epsilon() || paid_amount > total + epsilon() {
            return Err(DomainError::invariant(format!(
                "paid_amount {paid_amount} outside [0, {total}]"
            )));
        }

        Ok(Self {
            id,
            payer_id,
            currency,
            total,
            paid_amount,
            payment_status: PaymentStatus::project(paid_amount, total),
            version,
        })
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn payer_id(&self) -> PayerId {
        self.payer_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn paid_amount(&self) -> Decimal {
        self.paid_amount
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    /// What is still owed on this invoice.
    pub fn remaining_balance(&self) -> Decimal {
        self.total - self.paid_amount
    }

    /// Apply a settled amount, already expressed in the invoice currency.
    ///
    /// `paid_amount` is monotonically non-decreasing: the amount must be
    /// positive and must not exceed the remaining balance beyond epsilon. An
    /// epsilon-tolerated overshoot is capped at `total` so the invariant
    /// `paid_amount <= total` always holds exactly.
    pub fn apply_settlement(&mut self, amount: Decimal) -> DomainResult<()> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(
                "settlement amount must be positive",
            ));
        }
        if amount > self.remaining_balance() + epsilon() {
            return Err(DomainError::invariant(format!(
                "settlement amount {amount} exceeds remaining balance {}",
                self.remaining_balance()
            )));
        }

        self.paid_amount += amount;
        if self.paid_amount > self.total {
            self.paid_amount = self.total;
        }
        self.payment_status = PaymentStatus::project(self.paid_amount, self.total);
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
