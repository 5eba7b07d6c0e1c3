#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Plexus Types
//!
//! This crate is the foundational library for the plexus SDK, containing the
//! identity algebra, the element address model, pin selectors, wire values,
//! and the unified error taxonomy.
//!
//! ## Architectural Role
//!
//! As the base crate, `plexus-types` has minimal dependencies and is itself a
//! dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like [`tag::Uid`], [`Address`], [`ItemSelector`], and the
//! [`error::Error`] type that every fallible operation in the SDK returns.

/// A crate-wide `Result` alias with the SDK error type as the default.
pub type Result<T, E = crate::error::Error> = std::result::Result<T, E>;

/// Element coordinates: [`Address`], [`ElementId`], and their LSM key forms.
pub mod address;
/// The canonical, deterministic binary codec plus LEB128 varint helpers.
pub mod codec;
/// The per-node edit table mapping elements to their latest edit UID.
pub mod edit;
/// The unified error taxonomy used across the SDK.
pub mod error;
/// Pin request model: modes, statuses, and the client-supplied request record.
pub mod pin;
/// Selector model: item spans and the selector set they form.
pub mod selector;
/// The identity algebra: `Uid`, `Uid3`, and canonic tag expressions.
pub mod tag;
/// The object-safe `Value` trait for attribute payloads.
pub mod value;
/// Standard wire values: tags, logins, and errors-as-values.
pub mod values;

pub use address::{Address, AddressLsm, ElementId, ElementLsm};
pub use error::{Error, ErrorKind};
pub use pin::{PinMode, PinRequest, PinStatus};
pub use selector::{ElementRange, ItemSelector, ItemSpan};
pub use tag::{Name, Uid, Uid3};
pub use value::Value;
