//! App module and instance contracts.

use std::sync::Arc;

use async_trait::async_trait;

use plexus_task::Context;
use plexus_tx::TxMsg;
use plexus_types::error::stock;
use plexus_types::tag::{Name, Uid};
use plexus_types::{PinRequest, Result};

use crate::host::Session;
use crate::request::Request;

/// Runtime support handed to a newly launched app instance.
pub struct AppContext {
    /// The instance's task context: a child of the owning session.
    pub ctx: Context,
    /// The owning session.
    pub session: Arc<dyn Session>,
}

/// Instantiation entry point of an [`AppModule`], called when the module is
/// first invoked on a session and not yet running. Implementations should
/// not block and return quickly.
pub type AppFactory =
    Arc<dyn Fn(AppContext) -> Result<Arc<dyn AppInstance>> + Send + Sync>;

/// How an app registers with a host. The host instantiates an
/// [`AppInstance`] when a client request invokes one of the module's
/// registered tags.
#[derive(Clone)]
pub struct AppModule {
    /// Unique, persistent identity of this module.
    pub spec: Name,
    /// Human-readable description.
    pub desc: String,
    /// `v{major}.{minor}.{rev}`.
    pub version: String,
    /// Module UIDs this app may access.
    pub dependencies: Vec<Uid>,
    /// Additional aliases that invoke this app.
    pub invocations: Vec<String>,
    /// Creates a new instance for a session.
    pub new_instance: AppFactory,
}

impl AppModule {
    /// The module's UID.
    pub fn uid(&self) -> Uid {
        self.spec.id
    }
}

impl std::fmt::Debug for AppModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppModule")
            .field("spec", &self.spec.canonic)
            .field("version", &self.version)
            .field("invocations", &self.invocations)
            .finish_non_exhaustive()
    }
}

/// Pinners process a pin request, pushing responses to the requester.
#[async_trait]
pub trait Pinner: Send + Sync {
    /// Creates and serves the given request.
    async fn serve_request(&self, req: Arc<Request>) -> Result<Arc<dyn Pin>>;
}

/// A live app running inside one session, serving pin requests.
#[async_trait]
pub trait AppInstance: Pinner {
    /// The instance's task context. Closing it closes every pin started
    /// under this instance.
    fn context(&self) -> &Context;

    /// Validates a request and performs any needed setup (e.g. refreshing
    /// an auth token). Called before [`Pinner::serve_request`].
    async fn make_ready(&self, req: &Request) -> Result<()>;

    /// Called exactly once when this instance closes.
    fn on_closing(&self) {}
}

/// An attribute state connection to an app: the serving side of one pin
/// request. The handling app updates the requester with state changes as
/// requested.
#[async_trait]
pub trait Pin: Pinner {
    /// The pin's task context: a child of its app instance (or of another
    /// pin), so closing an app closes all its pins.
    fn context(&self) -> &Context;

    /// Queues a client-submitted transaction against the pinned state.
    ///
    /// The merge/acknowledge semantics of client-submitted transactions
    /// are not specified yet; the default declines.
    async fn commit_tx(&self, tx: Arc<TxMsg>) -> Result<()> {
        let _ = tx;
        Err(stock::unimplemented())
    }

    /// Updates the pin's filter from a revised request.
    ///
    /// Not specified yet; the default declines.
    async fn revise_request(&self, latest: PinRequest) -> Result<()> {
        let _ = latest;
        Err(stock::unimplemented())
    }
}
