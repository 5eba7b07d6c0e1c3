//! The object-safe trait every attribute payload implements.
//!
//! A `Value` knows how to append itself to a transaction data store, merge
//! itself from a byte span, and clone a default instance of its own type —
//! the prototype contract the registry relies on to instantiate values for
//! a known attr UID. Payload bytes are the canonical codec of
//! [`crate::codec`], so independent clients serialize identically.

use std::any::Any;

use crate::Result;

/// A data element that can travel inside a transaction.
pub trait Value: Any + Send + Sync + std::fmt::Debug {
    /// Appends this value's canonical bytes to `dst`.
    fn marshal_to_store(&self, dst: &mut Vec<u8>) -> Result<()>;

    /// Replaces this value with the one decoded from `src`.
    fn unmarshal(&mut self, src: &[u8]) -> Result<()>;

    /// Creates a default instance of this same value type — the prototype
    /// contract used by the registry's `make_value`.
    fn new_value(&self) -> Box<dyn Value>;

    /// Access to the concrete type for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Implements [`Value`] for types carrying the canonical codec derives.
#[macro_export]
macro_rules! impl_value {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::value::Value for $ty {
            fn marshal_to_store(&self, dst: &mut Vec<u8>) -> $crate::Result<()> {
                dst.extend_from_slice(&$crate::codec::to_bytes_canonical(self));
                Ok(())
            }

            fn unmarshal(&mut self, src: &[u8]) -> $crate::Result<()> {
                *self = $crate::codec::from_bytes_canonical(src)?;
                Ok(())
            }

            fn new_value(&self) -> Box<dyn $crate::value::Value> {
                Box::new(<$ty>::default())
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    )+};
}
