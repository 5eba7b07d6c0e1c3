#![forbid(unsafe_code)]

//! # Plexus Host
//!
//! The stock host runtime: a [`SessionHost`] binds transports to
//! [`HostSession`]s, each session routes incoming transactions to app
//! instances resolved through a [`HostRegistry`], and every piece runs as
//! a node of the cooperative task tree so closing the host tears the whole
//! structure down.

mod config;
mod host;
mod registry;
mod session;

pub use config::HostConfig;
pub use host::SessionHost;
pub use registry::HostRegistry;
pub use session::HostSession;
