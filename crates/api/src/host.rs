//! Host, session, and transport contracts.

use std::sync::Arc;

use async_trait::async_trait;

use plexus_task::Context;
use plexus_tx::TxMsg;
use plexus_types::tag::Uid;
use plexus_types::values::Login;
use plexus_types::{Error, PinStatus, Result};

use crate::app::AppInstance;
use crate::registry::Registry;

/// A duplex channel of serialized transactions, binding a host session to
/// any byte transport. [`plexus_types::ErrorKind::NotConnected`] denotes
/// normal stream close in both directions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Describes this transport for logging and debugging.
    fn label(&self) -> String;

    /// Sends a transaction to the remote peer.
    async fn send_tx(&self, tx: Arc<TxMsg>) -> Result<()>;

    /// Blocks until a transaction arrives or the stream is done.
    async fn recv_tx(&self) -> Result<TxMsg>;

    /// Closes the transport; called when the owning session closes.
    async fn close(&self);
}

/// Handles and processes incoming transactions.
#[async_trait]
pub trait TxReceiver: Send + Sync {
    /// Queues `tx` appropriately, aborting with the context's error when
    /// `ctx` closes first.
    async fn push_tx(&self, tx: Arc<TxMsg>, ctx: &Context) -> Result<()>;
}

/// Events reported over a pin's life cycle.
#[derive(Debug, Clone)]
pub struct PinEvent {
    /// Status this event reports.
    pub status: PinStatus,
    /// Relevant transaction, if applicable.
    pub tx: Option<Arc<TxMsg>>,
    /// Error, if any, for this event.
    pub error: Option<Error>,
}

/// Wraps a client request to receive state updates and lifecycle events.
pub trait Requester: TxReceiver {
    /// Notifies this requester of a pin lifecycle event.
    fn recv_event(&self, event: PinEvent);
}

/// A transaction submitted for commit: the tx, where replies go, and the
/// context bounding the submission.
pub struct TxCommit {
    /// The transaction to commit or route.
    pub tx: Arc<TxMsg>,
    /// Where replies and status updates are sent.
    pub origin: Arc<dyn Requester>,
    /// Submission context; its close aborts the submission.
    pub ctx: Context,
}

/// An open client session with a host.
///
/// A session is a task-tree node ([`Session::context`]); closing it closes
/// every app instance and pin underneath.
#[async_trait]
pub trait Session: Send + Sync {
    /// The task context underlying this session.
    fn context(&self) -> &Context;

    /// The session's registry: types and app modules resolvable here.
    fn registry(&self) -> Arc<dyn Registry>;

    /// Read-only info about this user and session.
    fn login(&self) -> Login;

    /// A fresh transaction stamped for this session.
    fn new_tx(&self) -> TxMsg {
        TxMsg::genesis()
    }

    /// Submits a transaction for routing and processing. Aborts with
    /// [`plexus_types::ErrorKind::ShuttingDown`] once the session closes,
    /// or with the commit context's error if that closes first.
    async fn submit_tx(&self, commit: TxCommit) -> Result<()>;

    /// The live instance of the given app module, launching one when
    /// `auto_create` is set and none is running.
    async fn get_app_instance(
        &self,
        module_id: Uid,
        auto_create: bool,
    ) -> Result<Arc<dyn AppInstance>>;
}

/// Binds transports to sessions and owns the process registry.
#[async_trait]
pub trait Host: Send + Sync {
    /// The task context underlying this host.
    fn context(&self) -> &Context;

    /// The host's registry, imported by every new session.
    fn registry(&self) -> Arc<dyn Registry>;

    /// Creates a new session bound to the given transport.
    async fn start_new_session(&self, transport: Arc<dyn Transport>) -> Result<Arc<dyn Session>>;
}

/// Attaches to a host as a child, extending host functionality (e.g. a
/// listener accepting transports).
#[async_trait]
pub trait HostService: Send + Sync {
    /// The task context underlying this service.
    fn context(&self) -> &Context;

    /// Attaches to `host` and starts this service.
    async fn start_service(&self, host: Arc<dyn Host>) -> Result<()>;

    /// Initiates a polite stop and blocks until the service has
    /// effectively stopped; the context remains open until closed.
    async fn stop_service(&self);
}
