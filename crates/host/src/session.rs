//! The stock session: transaction routing and app-instance management.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use plexus_api::{
    AppContext, AppInstance, PinEvent, Registry, Request, Session, TxCommit,
};
use plexus_task::{Context, Task};
use plexus_types::error::stock;
use plexus_types::tag::Uid;
use plexus_types::values::Login;
use plexus_types::{Error, ErrorKind, PinMode, PinStatus, Result};

use crate::config::HostConfig;
use crate::registry::HostRegistry;

/// An open client session. Routes submitted transactions to app
/// instances; runs as a task-tree child of its host.
pub struct HostSession {
    ctx: Context,
    registry: Arc<HostRegistry>,
    login: RwLock<Login>,
    commits: mpsc::Sender<TxCommit>,
    instances: Arc<DashMap<Uid, Arc<dyn AppInstance>>>,
    app_idle_close: Duration,
    weak: OnceLock<std::sync::Weak<HostSession>>,
}

impl HostSession {
    /// Starts a session under `parent`, with its own registry seeded from
    /// `host_registry`.
    pub fn start(
        parent: &Context,
        host_registry: &HostRegistry,
        login: Login,
        config: &HostConfig,
    ) -> Result<Arc<HostSession>> {
        let registry = Arc::new(HostRegistry::new());
        registry.import(host_registry)?;

        let ctx = parent.start_child(Task::new("session"))?;
        let (commits, commit_rx) = mpsc::channel(config.commit_queue_depth.max(1));

        let session = Arc::new(HostSession {
            ctx,
            registry,
            login: RwLock::new(login),
            commits,
            instances: Arc::new(DashMap::new()),
            app_idle_close: config.app_idle_close(),
            weak: OnceLock::new(),
        });
        let _ = session.weak.set(Arc::downgrade(&session));

        let router = session.clone();
        session
            .ctx
            .go("tx router", move |rctx| router.route_loop(rctx, commit_rx))?;

        Ok(session)
    }

    async fn route_loop(self: Arc<Self>, ctx: Context, mut commits: mpsc::Receiver<TxCommit>) {
        loop {
            tokio::select! {
                _ = ctx.closing() => break,
                next = commits.recv() => match next {
                    Some(commit) => self.route_commit(commit).await,
                    None => break,
                },
            }
        }
    }

    async fn route_commit(self: &Arc<Self>, commit: TxCommit) {
        if let Err(err) = self.route_inner(&commit).await {
            tracing::warn!(target: "session", error = %err, "request failed");
            commit.origin.recv_event(PinEvent {
                status: PinStatus::Complete,
                tx: None,
                error: Some(err),
            });
        }
    }

    /// Routes one commit: resolve the module from the request's invoke
    /// tag, ready an instance, and hand it the bound [`Request`]. The pin
    /// pushes state and emits events on its own from there.
    async fn route_inner(self: &Arc<Self>, commit: &TxCommit) -> Result<()> {
        let pin_req = commit
            .tx
            .header
            .request
            .clone()
            .ok_or_else(|| ErrorKind::BadRequest.err("tx carries no pin request"))?;

        if pin_req.mode == PinMode::Commit {
            // merge/acknowledge semantics of client-submitted tx are not
            // specified yet
            return Err(ErrorKind::Unimplemented.err("client tx commit"));
        }

        let invoke = pin_req.invoke.clone().unwrap_or_default();
        let module = self.registry.get_app_module(&invoke)?;
        let instance = self.get_instance(module.uid(), true)?;

        let mut request = Request::new(commit.origin.clone(), commit.tx.envelope.tx_id());
        request.tx = Some(commit.tx.clone());
        request.revise(&pin_req)?;

        instance.make_ready(&request).await?;
        instance.serve_request(Arc::new(request)).await?;
        Ok(())
    }

    fn get_instance(
        self: &Arc<Self>,
        module_id: Uid,
        auto_create: bool,
    ) -> Result<Arc<dyn AppInstance>> {
        if let Some(live) = self.instances.get(&module_id) {
            return Ok(live.clone());
        }
        if !auto_create {
            return Err(Error::path_not_found(format!(
                "app {module_id} is not running"
            )));
        }

        let module = self.registry.module_by_uid(module_id)?;

        let entry = self.instances.entry(module_id);
        match entry {
            dashmap::mapref::entry::Entry::Occupied(live) => Ok(live.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let closing_slot: Arc<OnceLock<Arc<dyn AppInstance>>> =
                    Arc::new(OnceLock::new());
                let hook_slot = closing_slot.clone();
                let table = self.instances.clone();

                let app_ctx = self.ctx.start_child(
                    Task::new(format!("app: {}", module.spec.canonic))
                        .idle_close(self.app_idle_close)
                        .on_closing(move || {
                            if let Some(instance) = hook_slot.get() {
                                instance.on_closing();
                            }
                        })
                        .on_closed(move || {
                            table.remove(&module_id);
                        }),
                )?;

                let instance = (module.new_instance)(AppContext {
                    ctx: app_ctx,
                    session: self.clone(),
                })?;
                let _ = closing_slot.set(instance.clone());
                slot.insert(instance.clone());
                tracing::info!(
                    target: "session",
                    module = %module.spec.canonic,
                    "app instance started"
                );
                Ok(instance)
            }
        }
    }
}

#[async_trait]
impl Session for HostSession {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn registry(&self) -> Arc<dyn Registry> {
        self.registry.clone()
    }

    fn login(&self) -> Login {
        self.login.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn submit_tx(&self, commit: TxCommit) -> Result<()> {
        let commit_ctx = commit.ctx.clone();
        tokio::select! {
            sent = self.commits.send(commit) => {
                sent.map_err(|_| stock::shutting_down())
            }
            _ = self.ctx.closing() => Err(stock::shutting_down()),
            _ = commit_ctx.closing() => {
                Err(commit_ctx
                    .err()
                    .unwrap_or_else(|| ErrorKind::Cancelled.err("commit context closed")))
            }
        }
    }

    async fn get_app_instance(
        &self,
        module_id: Uid,
        auto_create: bool,
    ) -> Result<Arc<dyn AppInstance>> {
        let this = self
            .weak
            .get()
            .and_then(std::sync::Weak::upgrade)
            .ok_or_else(|| ErrorKind::ContextNotReady.err("session not fully started"))?;
        this.get_instance(module_id, auto_create)
    }
}
