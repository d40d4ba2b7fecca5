use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clinipay_core::money::{Currency, epsilon};
use clinipay_core::{AggregateId, AggregateRoot, DomainError, DomainResult, PayerId, ValueObject};

/// Credit identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditId(pub AggregateId);

impl CreditId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CreditId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Origin of a credit balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    /// Issued against a returned or voided charge.
    CreditNote,
    /// Left over from a prior payment (e.g. an overpayment on account).
    DirectPayment,
}

/// Aggregate root: Credit.
///
/// A spendable balance from a prior payment or credit note. Issuance is
/// external; the settlement engine only decrements `available_balance`, and a
/// credit that reaches zero stays around as an audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    id: CreditId,
    payer_id: PayerId,
    kind: CreditKind,
    currency: Currency,
    available_balance: Decimal,
    version: u64,
}

impl Credit {
    /// Rehydrate a credit from stored state.
    pub fn new(
        id: CreditId,
        payer_id: PayerId,
        kind: CreditKind,
        currency: Currency,
        available_balance: Decimal,
        version: u64,
    ) -> DomainResult<Self> {
        if available_balance < Decimal::ZERO {
            return Err(DomainError::validation(
                "credit balance cannot be negative",
            ));
        }

        Ok(Self {
            id,
            payer_id,
            kind,
            currency,
            available_balance,
            version,
        })
    }

    pub fn id_typed(&self) -> CreditId {
        self.id
    }

    pub fn payer_id(&self) -> PayerId {
        self.payer_id
    }

    pub fn kind(&self) -> CreditKind {
        self.kind
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn available_balance(&self) -> Decimal {
        self.available_balance
    }

    pub fn has_balance(&self) -> bool {
        self.available_balance > Decimal::ZERO
    }

    /// Consume part of the balance, in the credit's own currency.
    ///
    /// The amount must be positive and must not exceed the available balance
    /// beyond epsilon. The balance is floored at zero so an epsilon-tolerated
    /// overdraw can never leave it negative. Returns the immutable
    /// consumption record to append to the audit trail.
    pub fn consume(
        &mut self,
        amount: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<CreditConsumption> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(
                "credit application amount must be positive",
            ));
        }
        if amount > self.available_balance + epsilon() {
            return Err(DomainError::invariant(format!(
                "credit application {amount} exceeds available balance {}",
                self.available_balance
            )));
        }

        let resulting_balance = (self.available_balance - amount).max(Decimal::ZERO);
        self.available_balance = resulting_balance;
        self.version += 1;

        Ok(CreditConsumption {
            credit_id: self.id,
            amount,
            resulting_balance,
            occurred_at,
        })
    }
}

impl AggregateRoot for Credit {
    type Id = CreditId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Immutable record appended for every credit application.
///
/// The sum of all consumptions for a credit never exceeds the balance the
/// credit was issued with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditConsumption {
    pub credit_id: CreditId,
    /// Consumed amount, in the credit's own currency.
    pub amount: Decimal,
    /// Balance left on the credit immediately after this consumption.
    pub resulting_balance: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl ValueObject for CreditConsumption {}
