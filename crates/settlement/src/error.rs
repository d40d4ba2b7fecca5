//! Error taxonomy for settlement attempts.

use rust_decimal::Decimal;
use thiserror::Error;

use clinipay_billing::CreditId;
use clinipay_core::money::Currency;
use clinipay_core::{DomainError, SessionId};

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, SettlementError>;

/// Failure of a settlement attempt.
///
/// Every variant carries the violated rule and the numeric quantities
/// involved so the caller can present an actionable message; the engine never
/// clamps or auto-corrects amounts. No error is ever returned after a partial
/// commit — validation strictly precedes mutation. Only
/// [`SettlementError::ConcurrencyConflict`] is worth retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Malformed request shape (unknown entity, duplicate application, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A credit application exceeds that credit's available balance.
    #[error("insufficient credit {credit_id}: requested {requested}, available {available}")]
    InsufficientCredit {
        credit_id: CreditId,
        requested: Decimal,
        available: Decimal,
    },

    /// The credit applications alone exceed the invoice's remaining balance.
    #[error("credits total {credits_total} exceeds remaining balance {remaining_balance}")]
    OverAllocatedCredits {
        credits_total: Decimal,
        remaining_balance: Decimal,
    },

    /// Credits plus the manual tender exceed the invoice's remaining balance.
    #[error("attempted total {attempted} exceeds remaining balance {remaining_balance}")]
    Overpayment {
        attempted: Decimal,
        remaining_balance: Decimal,
    },

    /// A positive manual amount was supplied without a payment method.
    #[error("manual payment requires a payment method")]
    MissingPaymentMethod,

    /// A cross-currency amount had no resolvable exchange rate.
    #[error("no exchange rate available to convert {from} into {to}")]
    MissingExchangeRate { from: Currency, to: Currency },

    /// Neither credits nor a positive manual amount were supplied.
    #[error("settlement request carries nothing to apply")]
    EmptySettlement,

    /// The snapshot went stale before commit. Safe to retry with fresh state.
    #[error("concurrent update on {entity}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: String,
        expected: u64,
        actual: u64,
    },

    /// Propagated from the cash-session collaborator.
    #[error("no active cash session: {0}")]
    NoActiveSession(SessionId),

    /// Domain-level failure from a billing entity.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage-layer failure (lock poisoning, backend errors).
    #[error("storage error: {0}")]
    Storage(String),
}

impl SettlementError {
    /// Whether the caller may retry the same settlement against a freshly
    /// loaded snapshot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::ConcurrencyConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_concurrency_conflicts_are_retryable() {
        let conflict = SettlementError::ConcurrencyConflict {
            entity: "invoice".to_string(),
            expected: 3,
            actual: 4,
        };
        assert!(conflict.is_retryable());
        assert!(!SettlementError::EmptySettlement.is_retryable());
        assert!(!SettlementError::MissingPaymentMethod.is_retryable());
    }
}
