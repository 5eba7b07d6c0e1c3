#![forbid(unsafe_code)]

//! # Plexus Test Utils
//!
//! In-memory plumbing for exercising the runtime end to end: a duplex
//! [`MemoryTransport`] that carries fully serialized transactions (so the
//! wire codec is on the path), a [`ScriptedRequester`] that records what a
//! pin pushes, and a small "cabinets" demo app with a static cell tree.

mod demo;
mod requester;
mod transport;

pub use demo::{demo_app, CABINETS_ROOT_LABEL, TOP_SHELF_LABEL};
pub use requester::ScriptedRequester;
pub use transport::MemoryTransport;
