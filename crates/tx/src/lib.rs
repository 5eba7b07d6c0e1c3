#![forbid(unsafe_code)]

//! # Plexus Tx
//!
//! The serialized transaction container exchanged between client and host.
//!
//! A [`TxMsg`] leads with a fixed 12-byte preamble, then a varint-prefixed
//! envelope and header, then a delta-encoded operation table, then an
//! opaque data store that op payloads reference by offset. Adjacent ops
//! usually share most of their address words, so the op table emits only
//! the words that changed, recorded in a per-op bitmask.
//!
//! Transactions are built exclusively through [`TxMsg::acquire`] /
//! [`TxMsg::genesis`]; their op and data buffers return to a process pool
//! when the last holder drops the message.

mod codec;
mod msg;
mod pool;

pub use msg::{
    TxEnvelope, TxHeader, TxMsg, TxOp, TxOpFlags, ValueHeaderFlags, TX_FIELD_COUNT,
};

/// The 24-bit magic marker leading every serialized transaction.
pub const TX_PREAMBLE_MARKER: u32 = 0xB5_E1A7;

/// The current preamble version; peers reject anything older.
pub const TX_PREAMBLE_VERSION: u8 = 1;

/// Byte length of the fixed preamble.
pub const TX_PREAMBLE_SIZE: usize = 12;
