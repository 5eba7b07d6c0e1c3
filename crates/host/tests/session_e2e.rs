//! End-to-end: a snapshot pin request over an in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use plexus_api::{Host, Registry, Transport, TxCommit, HEAD_NODE};
use plexus_host::SessionHost;
use plexus_test_utils::{
    demo_app, MemoryTransport, ScriptedRequester, CABINETS_ROOT_LABEL, TOP_SHELF_LABEL,
};
use plexus_tx::TxMsg;
use plexus_types::tag::Uid;
use plexus_types::values::TagValue;
use plexus_types::{ElementId, ErrorKind, PinMode, PinRequest, PinStatus};

use plexus_app::{ITEM_LABEL, ITEM_LINK};

const TICK: Duration = Duration::from_secs(5);

fn invoke_request(uri: &str, mode: PinMode) -> TxMsg {
    let mut tx = TxMsg::genesis();
    tx.header.request = Some(PinRequest {
        mode,
        invoke: Some(TagValue::from_uri(uri)),
        selector: None,
    });
    tx
}

#[tokio::test]
async fn snapshot_pin_over_transport() {
    let _ = plexus_telemetry::try_init();

    let host = SessionHost::start("e2e host").unwrap();
    host.host_registry().register_module(demo_app()).unwrap();

    let (client, server) = MemoryTransport::pair();
    let _session = host.start_new_session(server).await.unwrap();

    let tx = invoke_request("plexus://cabinets/~", PinMode::Snapshot);
    let request_id = tx.envelope.tx_id();
    client.send_tx(Arc::new(tx)).await.unwrap();

    // first push: the full pinned state
    let mut state = timeout(TICK, client.recv_tx()).await.unwrap().unwrap();
    assert_eq!(state.header.status, PinStatus::Synced);
    assert_eq!(state.header.context_id(), request_id);

    state.normalize(false).unwrap();

    // the head link names the pinned cell
    let pinned = state
        .ops
        .iter()
        .find(|op| op.addr.node == HEAD_NODE && op.addr.attr == *ITEM_LINK)
        .expect("head link op")
        .addr
        .item;
    assert!(pinned.is_set());

    // the pinned cell's label is loadable by element
    let mut label = TagValue::default();
    state
        .load_value(&ElementId::new(pinned, *ITEM_LABEL, Uid::NIL), &mut label)
        .unwrap();
    assert_eq!(label.text, CABINETS_ROOT_LABEL);

    // both shelves are linked off the pinned cell
    let shelf_links = state
        .ops
        .iter()
        .filter(|op| op.addr.node == pinned && op.addr.attr == *ITEM_LINK)
        .count();
    assert_eq!(shelf_links, 2);

    // the walk recursed: the top shelf's bins crossed the wire too
    let top_shelf = state
        .ops
        .iter()
        .enumerate()
        .filter(|(_, op)| op.addr.attr == *ITEM_LABEL)
        .find_map(|(i, op)| {
            let mut label = TagValue::default();
            state.unmarshal_op_value(i, &mut label).ok()?;
            (label.text == TOP_SHELF_LABEL).then_some(op.addr.node)
        })
        .expect("top shelf label op");
    let bin_links: Vec<Uid> = state
        .ops
        .iter()
        .filter(|op| op.addr.node == top_shelf && op.addr.attr == *ITEM_LINK)
        .map(|op| op.addr.item)
        .collect();
    assert_eq!(bin_links.len(), 2);
    for bin in bin_links {
        let mut label = TagValue::default();
        state
            .load_value(&ElementId::new(bin, *ITEM_LABEL, Uid::NIL), &mut label)
            .unwrap();
        assert!(label.text.ends_with("bin"));
    }

    // then the completion event for the same request
    let done = timeout(TICK, client.recv_tx()).await.unwrap().unwrap();
    assert_eq!(done.header.status, PinStatus::Complete);
    assert_eq!(done.header.context_id(), request_id);

    host.context().close();
    timeout(TICK, host.context().done()).await.unwrap();
}

#[tokio::test]
async fn direct_submit_routes_to_app() {
    let host = SessionHost::start("direct host").unwrap();
    host.host_registry().register_module(demo_app()).unwrap();

    let (_client, server) = MemoryTransport::pair();
    let session = host.start_new_session(server).await.unwrap();

    let requester = ScriptedRequester::new();
    let tx = invoke_request("plexus://cabinets/~", PinMode::Snapshot);
    session
        .submit_tx(TxCommit {
            tx: Arc::new(tx),
            origin: requester.clone(),
            ctx: session.context().clone(),
        })
        .await
        .unwrap();

    let pushed = timeout(TICK, requester.wait_for_pushed(1)).await.unwrap();
    assert_eq!(pushed[0].header.status, PinStatus::Synced);

    let events = timeout(TICK, requester.wait_for_events(1)).await.unwrap();
    assert_eq!(events[0].status, PinStatus::Complete);
    assert!(events[0].error.is_none());

    host.context().close();
    timeout(TICK, host.context().done()).await.unwrap();
}

#[tokio::test]
async fn unknown_module_reports_path_not_found() {
    let host = SessionHost::start("missing host").unwrap();
    let (_client, server) = MemoryTransport::pair();
    let session = host.start_new_session(server).await.unwrap();

    let requester = ScriptedRequester::new();
    session
        .submit_tx(TxCommit {
            tx: Arc::new(invoke_request("plexus://nowhere/~", PinMode::Snapshot)),
            origin: requester.clone(),
            ctx: session.context().clone(),
        })
        .await
        .unwrap();

    let events = timeout(TICK, requester.wait_for_events(1)).await.unwrap();
    let err = events[0].error.as_ref().expect("routing error");
    assert_eq!(err.kind, ErrorKind::ItemNotFound);

    host.context().close();
    timeout(TICK, host.context().done()).await.unwrap();
}

#[tokio::test]
async fn commit_mode_is_declined() {
    let host = SessionHost::start("commit host").unwrap();
    host.host_registry().register_module(demo_app()).unwrap();
    let (_client, server) = MemoryTransport::pair();
    let session = host.start_new_session(server).await.unwrap();

    let requester = ScriptedRequester::new();
    session
        .submit_tx(TxCommit {
            tx: Arc::new(invoke_request("plexus://cabinets/~", PinMode::Commit)),
            origin: requester.clone(),
            ctx: session.context().clone(),
        })
        .await
        .unwrap();

    let events = timeout(TICK, requester.wait_for_events(1)).await.unwrap();
    let err = events[0].error.as_ref().expect("commit must decline");
    assert_eq!(err.kind, ErrorKind::Unimplemented);

    host.context().close();
    timeout(TICK, host.context().done()).await.unwrap();
}

#[tokio::test]
async fn closed_session_declines_submissions() {
    let host = SessionHost::start("closing host").unwrap();
    host.host_registry().register_module(demo_app()).unwrap();
    let (_client, server) = MemoryTransport::pair();
    let session = host.start_new_session(server).await.unwrap();

    session.context().close();
    timeout(TICK, session.context().done()).await.unwrap();

    let requester = ScriptedRequester::new();
    let err = session
        .submit_tx(TxCommit {
            tx: Arc::new(invoke_request("plexus://cabinets/~", PinMode::Snapshot)),
            origin: requester,
            ctx: host.context().clone(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ShuttingDown);

    host.context().close();
    timeout(TICK, host.context().done()).await.unwrap();
}
