//! Collaborator boundaries consumed by the engine.
//!
//! Each trait hands back a validated, typed value or an error — the engine
//! never inspects ambiguous shapes. Production implementations live with the
//! hosting application; the in-memory ones here back tests and development.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use clinipay_billing::{Credit, PaymentMethodId};
use clinipay_core::money::{Currency, ExchangeRate};
use clinipay_core::{PayerId, SessionId};

use crate::error::{Result, SettlementError};

/// Snapshot of a working cash session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashSession {
    pub id: SessionId,
    pub is_active: bool,
    pub base_currency: Currency,
    /// Session-wide default rate; a request may override it per settlement.
    pub default_exchange_rate: Option<ExchangeRate>,
}

/// Supplies cash-session state.
///
/// An absent or inactive session is reported as
/// [`SettlementError::NoActiveSession`]; the engine propagates it verbatim.
pub trait CashSessionService: Send + Sync {
    fn session(&self, id: SessionId) -> Result<CashSession>;
}

/// Read-side supply of a payer's credits, used by callers to build a request.
///
/// The engine treats the list as already correct and only consumes balances
/// it is told about.
pub trait CreditSourceService: Send + Sync {
    fn credits_for(&self, payer_id: PayerId) -> Result<Vec<Credit>>;
}

/// Enumerates the valid manual payment methods.
pub trait PaymentMethodCatalog: Send + Sync {
    fn contains(&self, method: &PaymentMethodId) -> bool;
}

impl<S> CashSessionService for Arc<S>
where
    S: CashSessionService + ?Sized,
{
    fn session(&self, id: SessionId) -> Result<CashSession> {
        (**self).session(id)
    }
}

impl<S> CreditSourceService for Arc<S>
where
    S: CreditSourceService + ?Sized,
{
    fn credits_for(&self, payer_id: PayerId) -> Result<Vec<Credit>> {
        (**self).credits_for(payer_id)
    }
}

impl<S> PaymentMethodCatalog for Arc<S>
where
    S: PaymentMethodCatalog + ?Sized,
{
    fn contains(&self, method: &PaymentMethodId) -> bool {
        (**self).contains(method)
    }
}

/// Fixed set of cash sessions (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryCashSessions {
    sessions: HashMap<SessionId, CashSession>,
}

impl InMemoryCashSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: CashSession) -> Self {
        self.sessions.insert(session.id, session);
        self
    }
}

impl CashSessionService for InMemoryCashSessions {
    fn session(&self, id: SessionId) -> Result<CashSession> {
        self.sessions
            .get(&id)
            .filter(|s| s.is_active)
            .cloned()
            .ok_or(SettlementError::NoActiveSession(id))
    }
}

/// Fixed list of credits (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryCreditSource {
    credits: Vec<Credit>,
}

impl InMemoryCreditSource {
    pub fn new(credits: Vec<Credit>) -> Self {
        Self { credits }
    }
}

impl CreditSourceService for InMemoryCreditSource {
    fn credits_for(&self, payer_id: PayerId) -> Result<Vec<Credit>> {
        Ok(self
            .credits
            .iter()
            .filter(|c| c.payer_id() == payer_id)
            .cloned()
            .collect())
    }
}

/// Static payment-method catalog (tests/dev).
#[derive(Debug, Default)]
pub struct StaticPaymentMethods {
    methods: HashSet<PaymentMethodId>,
}

impl StaticPaymentMethods {
    pub fn new(methods: impl IntoIterator<Item = PaymentMethodId>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl PaymentMethodCatalog for StaticPaymentMethods {
    fn contains(&self, method: &PaymentMethodId) -> bool {
        self.methods.contains(method)
    }
}
