//! Session-level load/store helpers built on snapshot pins and meta ops.

use std::sync::Arc;

use async_trait::async_trait;

use plexus_api::{PinEvent, Requester, Session, TxCommit, TxReceiver, HEAD_NODE};
use plexus_task::Context;
use plexus_tx::{TxMsg, TxOp, TxOpFlags};
use plexus_types::tag::Uid;
use plexus_types::values::TagValue;
use plexus_types::{
    Address, ElementId, ErrorKind, ItemSelector, PinMode, PinRequest, PinStatus, Result, Value,
};

use crate::attrs::SESSION_CONTEXT_ID;

/// A snapshot pin request for exactly one element.
pub fn setup_snapshot(target: ElementId) -> PinRequest {
    let mut selector = ItemSelector::default();
    selector.select(target);
    PinRequest {
        mode: PinMode::Snapshot,
        invoke: Some(TagValue::from_uri("plexus://cabinets/~")),
        selector: Some(selector),
    }
}

/// Stamps `tx` as a commit submission against the member's home node.
pub fn setup_commit(tx: &mut TxMsg) {
    tx.header.request = Some(PinRequest {
        mode: PinMode::Commit,
        invoke: Some(TagValue::from_uri("plexus://cabinets/~")),
        selector: None,
    });
}

/// Loads the latest element value from the app's home node; useful for
/// high-level app state such as auth tokens.
///
/// Submits a snapshot pin, awaits the pushed transaction, and extracts the
/// attr's value into `dst`. Aborts with the context's error when `ctx`
/// closes first.
pub async fn blocking_load(
    session: &Arc<dyn Session>,
    ctx: &Context,
    node: Uid,
    attr: Uid,
    dst: &mut dyn Value,
) -> Result<()> {
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<Result<Arc<TxMsg>>>(2);

    let mut tx = session.new_tx();
    tx.header.request = Some(setup_snapshot(ElementId::new(node, attr, Uid::NIL)));

    session
        .submit_tx(TxCommit {
            tx: Arc::new(tx),
            origin: Arc::new(LocalLoad { reply: reply_tx }),
            ctx: ctx.clone(),
        })
        .await?;

    tokio::select! {
        reply = reply_rx.recv() => match reply {
            Some(Ok(tx)) => tx.extract_value(attr, Uid::NIL, dst),
            Some(Err(err)) => Err(err),
            None => Err(ErrorKind::RequestClosed.err("load reply channel closed")),
        },
        _ = ctx.closing() => Err(ErrorKind::Cancelled.err("context closed during load")),
    }
}

/// Write analog of [`blocking_load`]: submits an upsert of `src` for
/// commit. Completes when the host acknowledges the commit.
pub async fn blocking_store(
    session: &Arc<dyn Session>,
    ctx: &Context,
    node: Uid,
    attr: Uid,
    src: &dyn Value,
) -> Result<()> {
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<Result<()>>(2);

    let mut tx = session.new_tx();
    tx.upsert(node, attr, Uid::NIL, Some(src))?;
    setup_commit(&mut tx);

    session
        .submit_tx(TxCommit {
            tx: Arc::new(tx),
            origin: Arc::new(LocalCommit { reply: reply_tx }),
            ctx: ctx.clone(),
        })
        .await?;

    tokio::select! {
        reply = reply_rx.recv() => match reply {
            Some(outcome) => outcome,
            None => Err(ErrorKind::RequestClosed.err("commit reply channel closed")),
        },
        _ = ctx.closing() => Err(ErrorKind::Cancelled.err("context closed during commit")),
    }
}

/// Sends one meta op carrying `value` at `addr` to `dst`, stamped with the
/// given context UID and status.
pub async fn push_meta_op(
    dst: &dyn TxReceiver,
    ctx: &Context,
    addr: Address,
    value: Option<&dyn Value>,
    context_id: Uid,
    status: PinStatus,
) -> Result<()> {
    let mut op = TxOp {
        flags: TxOpFlags::META_OP,
        addr,
        ..TxOp::default()
    };
    let mut tx = TxMsg::genesis();
    tx.set_context_id(context_id);
    tx.header.status = status;
    tx.marshal_op(&mut op, value)?;
    dst.push_tx(Arc::new(tx), ctx).await
}

/// Sends an attr-value pair to the client's session agent for handling
/// (e.g. launching an OAuth flow).
pub async fn push_session_op(
    session: &Arc<dyn Session>,
    dst: &dyn TxReceiver,
    attr: Uid,
    value: Option<&dyn Value>,
) -> Result<()> {
    let addr = Address {
        node: HEAD_NODE,
        attr,
        ..Address::default()
    };
    push_meta_op(
        dst,
        session.context(),
        addr,
        value,
        SESSION_CONTEXT_ID,
        PinStatus::Synced,
    )
    .await
}

struct LocalLoad {
    reply: tokio::sync::mpsc::Sender<Result<Arc<TxMsg>>>,
}

#[async_trait]
impl TxReceiver for LocalLoad {
    async fn push_tx(&self, tx: Arc<TxMsg>, ctx: &Context) -> Result<()> {
        tokio::select! {
            sent = self.reply.send(Ok(tx)) => {
                sent.map_err(|_| ErrorKind::RequestClosed.err("loader gone"))
            }
            _ = ctx.closing() => Err(ErrorKind::Cancelled.err("context closed")),
        }
    }
}

impl Requester for LocalLoad {
    fn recv_event(&self, event: PinEvent) {
        if let Some(err) = event.error {
            let _ = self.reply.try_send(Err(err));
        }
    }
}

struct LocalCommit {
    reply: tokio::sync::mpsc::Sender<Result<()>>,
}

#[async_trait]
impl TxReceiver for LocalCommit {
    async fn push_tx(&self, _tx: Arc<TxMsg>, _ctx: &Context) -> Result<()> {
        // commits receive events, not state
        Err(ErrorKind::AssertFailed.err("unexpected push to commit origin"))
    }
}

impl Requester for LocalCommit {
    fn recv_event(&self, event: PinEvent) {
        if event.status == PinStatus::Complete {
            let _ = self.reply.try_send(match event.error {
                Some(err) => Err(err),
                None => Ok(()),
            });
        }
    }
}
