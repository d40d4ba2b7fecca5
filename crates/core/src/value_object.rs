//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value** — two value
/// objects with the same attribute values are the same value. Identity does
/// not matter: `Money { amount: 100, currency: Usd }` is equal to any other
/// `Money` with those values, whereas two invoices with equal fields are
/// still distinct entities.
///
/// To "modify" a value object, build a new one. The trait only requires what
/// that implies:
/// - `Clone`: values are cheap to copy around
/// - `PartialEq`: compared attribute-by-attribute
/// - `Debug`: printable in logs and test failures
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
