#![forbid(unsafe_code)]

//! # Plexus App
//!
//! A support template for building plexus app modules. Most apps build on
//! this crate — a [`Cell`] tree pinned through the generic [`CellPin`],
//! attributes marshaled through a [`CellWriter`] — though a specialized
//! app may opt to build its own foundation directly on `plexus-api`.

mod attrs;
mod cell;
mod commit;
mod writer;

pub use attrs::*;
pub use cell::{Cell, CellNode, CellPin};
pub use commit::{
    blocking_load, blocking_store, push_meta_op, push_session_op, setup_commit, setup_snapshot,
};
pub use writer::{CellWriter, TxCellWriter};
