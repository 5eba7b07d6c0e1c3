//! The host: registry owner and transport-to-session binder.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use plexus_api::{
    Host, PinEvent, Registry, Requester, Session, Transport, TxCommit, TxReceiver,
};
use plexus_app::{register_builtin_attrs, SESSION_ERR_ID};
use plexus_task::{Context, Task};
use plexus_tx::TxMsg;
use plexus_types::error::stock;
use plexus_types::tag::Uid;
use plexus_types::values::{ErrValue, Login};
use plexus_types::{Address, ErrorKind, Result};

use crate::config::HostConfig;
use crate::registry::HostRegistry;
use crate::session::HostSession;

/// The stock [`Host`]: owns the process registry and binds transports to
/// sessions. Runs as the root of its task tree; closing it closes every
/// session, app instance, and pin underneath.
pub struct SessionHost {
    ctx: Context,
    registry: Arc<HostRegistry>,
    config: HostConfig,
}

impl SessionHost {
    /// Starts a host with default tunables; see
    /// [`SessionHost::start_with_config`].
    pub fn start(label: &str) -> Result<Arc<SessionHost>> {
        SessionHost::start_with_config(HostConfig {
            label: label.to_string(),
            ..HostConfig::default()
        })
    }

    /// Starts a host with the standard attribute catalog pre-registered.
    pub fn start_with_config(config: HostConfig) -> Result<Arc<SessionHost>> {
        let registry = Arc::new(HostRegistry::new());
        register_builtin_attrs(&*registry)?;
        Ok(Arc::new(SessionHost {
            ctx: plexus_task::start(Task::new(config.label.clone())),
            registry,
            config,
        }))
    }

    /// The concrete registry, for host-side registration convenience.
    pub fn host_registry(&self) -> &Arc<HostRegistry> {
        &self.registry
    }
}

#[async_trait]
impl Host for SessionHost {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn registry(&self) -> Arc<dyn Registry> {
        self.registry.clone()
    }

    /// Binds `transport` to a fresh session: a reader loop turns received
    /// transactions into commits against the session, and a writer loop
    /// drains the session's outbox back over the transport. A malformed
    /// inbound transaction closes the transport and the session.
    async fn start_new_session(&self, transport: Arc<dyn Transport>) -> Result<Arc<dyn Session>> {
        let session =
            HostSession::start(&self.ctx, &self.registry, Login::default(), &self.config)?;
        let (outbox, outbox_rx) = mpsc::channel::<Arc<TxMsg>>(self.config.outbox_depth.max(1));

        tracing::info!(target: "host", transport = %transport.label(), "session started");

        let reader_session = session.clone();
        let reader_transport = transport.clone();
        let reader_outbox = outbox.clone();
        session.context().go("transport recv", move |ctx| async move {
            loop {
                let received = tokio::select! {
                    _ = ctx.closing() => break,
                    received = reader_transport.recv_tx() => received,
                };
                match received {
                    Ok(tx) => {
                        let origin = Arc::new(TransportRequester {
                            outbox: reader_outbox.clone(),
                            context_id: tx.envelope.tx_id(),
                        });
                        let commit = TxCommit {
                            tx: Arc::new(tx),
                            origin,
                            ctx: ctx.clone(),
                        };
                        if let Err(err) = reader_session.submit_tx(commit).await {
                            tracing::debug!(target: "host", error = %err, "submit aborted");
                            break;
                        }
                    }
                    Err(err) if err.kind == ErrorKind::NotConnected => break,
                    Err(err) => {
                        // malformed or failed stream: drop the transport
                        tracing::warn!(target: "host", error = %err, "closing transport");
                        reader_transport.close().await;
                        break;
                    }
                }
            }
            reader_session.context().close();
        })?;

        let writer_transport = transport;
        let writer_session = session.clone();
        session.context().go("transport send", move |ctx| async move {
            let mut outbox_rx = outbox_rx;
            loop {
                tokio::select! {
                    _ = ctx.closing() => break,
                    next = outbox_rx.recv() => match next {
                        Some(tx) => {
                            if let Err(err) = writer_transport.send_tx(tx).await {
                                if err.kind != ErrorKind::NotConnected {
                                    tracing::warn!(target: "host", error = %err, "send failed");
                                }
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            writer_transport.close().await;
            writer_session.context().close();
        })?;

        Ok(session)
    }
}

/// Requester standing in for one remote request: pushes state over the
/// session's outbox and serializes lifecycle events as session-error meta
/// ops.
struct TransportRequester {
    outbox: mpsc::Sender<Arc<TxMsg>>,
    context_id: Uid,
}

#[async_trait]
impl TxReceiver for TransportRequester {
    async fn push_tx(&self, tx: Arc<TxMsg>, ctx: &Context) -> Result<()> {
        tokio::select! {
            sent = self.outbox.send(tx) => sent.map_err(|_| stock::stream_closed()),
            _ = ctx.closing() => Err(ErrorKind::Cancelled.err("request context closed")),
        }
    }
}

impl Requester for TransportRequester {
    fn recv_event(&self, event: PinEvent) {
        let outbox = self.outbox.clone();
        let context_id = self.context_id;
        let status = event.status;
        let error = event.error;
        tokio::spawn(async move {
            let mut tx = TxMsg::genesis();
            tx.set_context_id(context_id);
            tx.header.status = status;
            if let Some(err) = &error {
                let addr = Address {
                    node: plexus_api::HEAD_NODE,
                    attr: *SESSION_ERR_ID,
                    ..Address::default()
                };
                let mut op = plexus_tx::TxOp {
                    flags: plexus_tx::TxOpFlags::META_OP,
                    addr,
                    ..plexus_tx::TxOp::default()
                };
                let value = ErrValue::from(err);
                if tx.marshal_op(&mut op, Some(&value)).is_err() {
                    return;
                }
            }
            let _ = outbox.send(Arc::new(tx)).await;
        });
    }
}
