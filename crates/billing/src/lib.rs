//! `clinipay-billing` — billing entities: invoices, credits, payment records.
//!
//! The settlement engine mutates these entities only through the methods
//! exposed here; every accepted mutation bumps the entity's version so
//! storage can detect racing settlements.

pub mod credit;
pub mod invoice;
pub mod payment;

pub use credit::{Credit, CreditConsumption, CreditId, CreditKind};
pub use invoice::{Invoice, InvoiceId, PaymentStatus};
pub use payment::{PaymentId, PaymentMethodId, PaymentRecord};
