//! `clinipay-settlement` — multi-currency invoice settlement.
//!
//! Combines pre-existing credit balances with one manual tender into a
//! single atomic, non-overpaying, non-double-spending update of an invoice's
//! paid amount and payment status.
//!
//! The entry point is [`SettlementEngine::settle`]: the caller builds an
//! immutable [`SettlementRequest`] from collaborator data it fetched up
//! front, and receives either a [`SettlementResult`] carrying the
//! authoritative post-commit state or a [`SettlementError`] with the violated
//! rule and the quantities involved — never a partial result.

pub mod collaborators;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod request;
pub mod store;
pub mod validator;

pub use collaborators::{
    CashSession, CashSessionService, CreditSourceService, InMemoryCashSessions,
    InMemoryCreditSource, PaymentMethodCatalog, StaticPaymentMethods,
};
pub use engine::{SettlementEngine, SettlementResult};
pub use error::SettlementError;
pub use ledger::CreditLedger;
pub use request::{CreditApplication, ManualPayment, SettlementRequest};
pub use store::{
    InMemorySettlementStore, SettlementCommit, SettlementSnapshot, SettlementStore,
};
pub use validator::{CreditLine, SettlementValidator};
