#![forbid(unsafe_code)]

//! # Plexus API
//!
//! Core contracts of the plexus SDK: how hosts bind transports to
//! sessions, how sessions route transactions to app instances, and how a
//! pin request becomes a live [`Request`] with a stateful [`ItemFilter`].
//!
//! Everything here is interface; `plexus-host` supplies the stock
//! implementations, and app modules build against these traits alone.

mod app;
mod filter;
mod host;
mod registry;
mod request;

pub use app::{AppContext, AppFactory, AppInstance, AppModule, Pin, Pinner};
pub use filter::ItemFilter;
pub use host::{Host, HostService, PinEvent, Requester, Session, Transport, TxCommit, TxReceiver};
pub use registry::{AttrDef, Registry, RegistryExport};
pub use request::{InvokeUrl, ParamValue, Request};

use plexus_types::tag::Uid;

/// The bootstrapping "head" node every session starts from: the root a
/// pin's first child link hangs off.
pub const HEAD_NODE: Uid = Uid([0, 0x11AD]);
