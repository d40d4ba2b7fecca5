//! Money primitives: currencies, amounts, exchange rates.
//!
//! All monetary amounts use [`rust_decimal::Decimal`] — exact arithmetic,
//! no floating point. Threshold comparisons between monetary totals use a
//! fixed [`epsilon`] tolerance of one cent to absorb conversion rounding.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Supported currencies (ISO 4217).
///
/// Exchange rates are quoted as units of the secondary currency per one unit
/// of the primary currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar — the primary currency.
    Usd,
    /// Uruguayan Peso — the secondary currency.
    Uyu,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Uyu => "UYU",
        }
    }

    /// Parse from an ISO 4217 code.
    pub fn from_code(code: &str) -> DomainResult<Self> {
        match code {
            "USD" => Ok(Currency::Usd),
            "UYU" => Ok(Currency::Uyu),
            other => Err(DomainError::validation(format!(
                "unsupported currency code: {other}"
            ))),
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Currency::Usd)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Fixed tolerance for monetary threshold comparisons (one cent).
pub fn epsilon() -> Decimal {
    Decimal::new(1, 2)
}

/// An amount in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }
}

impl ValueObject for Money {}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// A conversion rate: units of the secondary currency per one unit of the
/// primary currency.
///
/// Validated at construction — a rate of zero or below is not representable,
/// so conversion itself cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    pub fn new(rate: Decimal) -> DomainResult<Self> {
        if rate <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "exchange rate must be positive, got {rate}"
            )));
        }
        Ok(Self(rate))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Convert `money` into currency `to`.
    ///
    /// Identity when the currencies already match; otherwise multiplies
    /// (primary → secondary) or divides (secondary → primary) and rounds the
    /// result to 2 decimal places, midpoint away from zero. Round-tripping an
    /// amount through the secondary currency and back stays within
    /// [`epsilon`] for any rate of at least one.
    pub fn convert(&self, money: Money, to: Currency) -> Money {
        if money.currency == to {
            return money;
        }

        let converted = if money.currency.is_primary() {
            money.amount * self.0
        } else {
            money.amount / self.0
        };

        Money::new(
            converted.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            to,
        )
    }
}

impl ValueObject for ExchangeRate {}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
