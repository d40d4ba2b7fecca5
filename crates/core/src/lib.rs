//! `clinipay-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error model, entity/aggregate traits,
//! optimistic-concurrency versioning, and the money layer.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, PayerId, SessionId};
pub use money::{Currency, ExchangeRate, Money};
pub use value_object::ValueObject;
