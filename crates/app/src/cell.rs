//! Cell trees and the generic pin that serves them.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;

use plexus_api::{AppInstance, Pin, PinEvent, Pinner, Request, HEAD_NODE};
use plexus_task::{Context, Task};
use plexus_tx::TxMsg;
use plexus_types::tag::Uid;
use plexus_types::{Error, ErrorKind, PinMode, PinStatus, Result};

use crate::attrs::ITEM_LINK;
use crate::writer::{CellWriter, TxCellWriter};

/// One pinnable node of an app's state tree.
pub trait Cell: Send + Sync {
    /// The cell's root record.
    fn root(&self) -> &CellNode;

    /// Tells this cell it has been pinned; the cell registers its direct
    /// children on the pin and prepares whatever `marshal_attrs` needs.
    /// Called once per cell as the pin walks the tree.
    fn pin_into(&self, pin: &CellPin) -> Result<()>;

    /// Serializes the cell's pinned attributes; called after `pin_into`.
    fn marshal_attrs(&self, w: &mut dyn CellWriter);
}

/// Identity record embedded by every [`Cell`] implementation.
#[derive(Default)]
pub struct CellNode {
    id: OnceLock<Uid>,
}

impl CellNode {
    /// A node whose UID is minted on first pin.
    pub fn new() -> CellNode {
        CellNode::default()
    }

    /// A node with a fixed UID.
    pub fn with_id(id: Uid) -> CellNode {
        let node = CellNode::default();
        let _ = node.id.set(id);
        node
    }

    /// The node's UID, minted on first access.
    pub fn id(&self) -> Uid {
        *self.id.get_or_init(Uid::now)
    }
}

#[derive(Clone)]
struct ChildEntry {
    parent: Uid,
    id: Uid,
    cell: Arc<dyn Cell>,
}

/// The pinned state of a cell: the serving side of one request. Runs as a
/// task child of the owning app instance, so closing the app closes every
/// pin.
pub struct CellPin {
    app: Arc<dyn AppInstance>,
    cell: Arc<dyn Cell>,
    request: Arc<Request>,
    children: Mutex<Vec<ChildEntry>>,
    expanding: Mutex<Uid>,
    ctx: OnceLock<Context>,
}

impl CellPin {
    /// Pins `cell` for `request` and serves it: starts a pin task under
    /// `app` whose body readies the app, walks the cell tree, pushes a
    /// state snapshot when the mode asks for one, and emits a final
    /// `Complete` event to the requester.
    pub fn pin_and_serve(
        cell: Arc<dyn Cell>,
        app: Arc<dyn AppInstance>,
        request: Arc<Request>,
    ) -> Result<Arc<dyn Pin>> {
        let pinned_id = cell.root().id();
        let pin = Arc::new(CellPin {
            app,
            cell,
            request,
            children: Mutex::new(Vec::new()),
            expanding: Mutex::new(pinned_id),
            ctx: OnceLock::new(),
        });

        let run_pin = pin.clone();
        let task = Task::new(format!("pin: {}", pinned_id.label()))
            .idle_close(Duration::from_micros(1))
            .on_run(move |pin_ctx| async move { run_pin.run(pin_ctx).await });

        let ctx = pin.app.context().start_child(task)?;
        let _ = pin.ctx.set(ctx);
        Ok(pin)
    }

    async fn run(&self, ctx: Context) {
        let mut outcome = self.app.make_ready(&self.request).await;
        if outcome.is_ok() {
            outcome = self.cell.pin_into(self);
        }
        if outcome.is_ok() {
            outcome = match self.request.filter.current.mode {
                PinMode::Snapshot | PinMode::MaintainSync => self.push_state(&ctx).await,
                PinMode::Commit => Ok(()),
            };
        }

        let error = outcome.err();
        if let Some(err) = &error {
            if err.kind != ErrorKind::ShuttingDown {
                tracing::warn!(target: "app", error = %err, "pin failed");
            }
        }
        self.request.requester.recv_event(PinEvent {
            status: PinStatus::Complete,
            tx: None,
            error,
        });
    }

    /// Registers `child` under the cell currently being walked, minting
    /// its UID if needed. Re-registering an already-known UID is a no-op,
    /// which keeps repeated walks stable and breaks reference cycles.
    pub fn add_child(&self, child: Arc<dyn Cell>) {
        let id = child.root().id();
        let parent = *self.expanding.lock().unwrap_or_else(|e| e.into_inner());
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        if children.iter().any(|entry| entry.id == id) {
            return;
        }
        children.push(ChildEntry {
            parent,
            id,
            cell: child,
        });
    }

    /// The pinned cell or any registered descendant.
    pub fn get_cell(&self, target: Uid) -> Option<Arc<dyn Cell>> {
        if target == self.cell.root().id() {
            return Some(self.cell.clone());
        }
        let children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children
            .iter()
            .find(|entry| entry.id == target)
            .map(|entry| entry.cell.clone())
    }

    fn child_at(&self, index: usize) -> Option<ChildEntry> {
        let children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children.get(index).cloned()
    }

    fn set_expanding(&self, id: Uid) {
        *self.expanding.lock().unwrap_or_else(|e| e.into_inner()) = id;
    }

    /// Serializes the whole cell tree into one transaction and pushes it
    /// to the requester: a head link naming the pinned cell, the cell's
    /// attributes, then — recursing through the registered children — one
    /// link plus attributes per descendant. Each cell's `pin_into` runs as
    /// it is reached, so grandchildren registered there join the same
    /// walk.
    async fn push_state(&self, ctx: &Context) -> Result<()> {
        let mut tx = TxMsg::genesis();
        tx.set_context_id(self.request.id);
        let pinned_id = self.cell.root().id();

        tx.upsert(HEAD_NODE, *ITEM_LINK, pinned_id, None)?;
        {
            let mut w = TxCellWriter::new(&mut tx, pinned_id);
            self.cell.marshal_attrs(&mut w);
            w.finish()?;
        }

        // the list grows as each visited cell registers its own children;
        // entries are unique by UID, so the walk terminates
        let mut index = 0;
        while let Some(entry) = self.child_at(index) {
            index += 1;

            tx.upsert(entry.parent, *ITEM_LINK, entry.id, None)?;
            {
                let mut w = TxCellWriter::new(&mut tx, entry.id);
                entry.cell.marshal_attrs(&mut w);
                w.finish()?;
            }

            self.set_expanding(entry.id);
            entry.cell.pin_into(self)?;
        }
        self.set_expanding(pinned_id);

        tx.header.status = PinStatus::Synced;
        tx.normalize(false)?;
        self.request.requester.push_tx(Arc::new(tx), ctx).await
    }

    fn pin_context(&self) -> &Context {
        self.ctx.get().expect("pin context set at start")
    }
}

#[async_trait]
impl Pinner for CellPin {
    /// Serves a sub-request against this pin: the invoke UID must name the
    /// pinned cell or one of its registered descendants.
    async fn serve_request(&self, req: Arc<Request>) -> Result<Arc<dyn Pin>> {
        let target = req
            .filter
            .current
            .invoke
            .as_ref()
            .map(|tag| tag.uid)
            .unwrap_or_default();

        let cell = self
            .get_cell(target)
            .ok_or_else(|| Error::channel_not_found(format!("no cell {target}")))?;
        CellPin::pin_and_serve(cell, self.app.clone(), req)
    }
}

#[async_trait]
impl Pin for CellPin {
    fn context(&self) -> &Context {
        self.pin_context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::ITEM_LABEL;
    use plexus_api::{Requester, TxReceiver};
    use plexus_types::values::TagValue;
    use plexus_types::ElementId;
    use tokio::sync::mpsc;

    struct BranchCell {
        node: CellNode,
        label: String,
        limbs: Vec<Arc<BranchCell>>,
    }

    impl BranchCell {
        fn new(label: &str, limbs: Vec<Arc<BranchCell>>) -> Arc<BranchCell> {
            Arc::new(BranchCell {
                node: CellNode::new(),
                label: label.to_string(),
                limbs,
            })
        }
    }

    impl Cell for BranchCell {
        fn root(&self) -> &CellNode {
            &self.node
        }

        fn pin_into(&self, pin: &CellPin) -> Result<()> {
            for limb in &self.limbs {
                pin.add_child(limb.clone());
            }
            Ok(())
        }

        fn marshal_attrs(&self, w: &mut dyn CellWriter) {
            w.push_text(*ITEM_LABEL, &self.label);
        }
    }

    struct StubApp {
        ctx: Context,
    }

    #[async_trait]
    impl Pinner for StubApp {
        async fn serve_request(&self, _req: Arc<Request>) -> Result<Arc<dyn Pin>> {
            Err(ErrorKind::Unimplemented.err("stub app"))
        }
    }

    #[async_trait]
    impl AppInstance for StubApp {
        fn context(&self) -> &Context {
            &self.ctx
        }

        async fn make_ready(&self, _req: &Request) -> Result<()> {
            Ok(())
        }
    }

    struct ChannelRequester {
        tx: mpsc::Sender<Arc<TxMsg>>,
    }

    #[async_trait]
    impl TxReceiver for ChannelRequester {
        async fn push_tx(&self, tx: Arc<TxMsg>, _ctx: &Context) -> Result<()> {
            self.tx
                .send(tx)
                .await
                .map_err(|_| ErrorKind::RequestClosed.err("recorder gone"))
        }
    }

    impl Requester for ChannelRequester {
        fn recv_event(&self, _event: PinEvent) {}
    }

    #[tokio::test]
    async fn push_state_recurses_through_grandchildren() {
        let root_ctx = Context::start_root(Task::new("pin test"));
        let app: Arc<dyn AppInstance> = Arc::new(StubApp {
            ctx: root_ctx.clone(),
        });

        // three levels: trunk -> branch -> (leaf-a, leaf-b)
        let leaves = vec![BranchCell::new("leaf-a", vec![]), BranchCell::new("leaf-b", vec![])];
        let branch = BranchCell::new("branch", leaves);
        let branch_id = branch.root().id();
        let trunk = BranchCell::new("trunk", vec![branch]);
        let trunk_id = trunk.root().id();

        let (reply_tx, mut reply_rx) = mpsc::channel(2);
        let requester = Arc::new(ChannelRequester { tx: reply_tx });
        let request = Arc::new(Request::new(requester, Uid::now()));

        CellPin::pin_and_serve(trunk, app, request).unwrap();

        let pushed = tokio::time::timeout(Duration::from_secs(5), reply_rx.recv())
            .await
            .unwrap()
            .expect("state push");

        // every level is linked: head -> trunk, trunk -> branch,
        // branch -> both leaves
        let links: Vec<(Uid, Uid)> = pushed
            .ops
            .iter()
            .filter(|op| op.addr.attr == *ITEM_LINK)
            .map(|op| (op.addr.node, op.addr.item))
            .collect();
        assert!(links.contains(&(HEAD_NODE, trunk_id)));
        assert!(links.contains(&(trunk_id, branch_id)));
        assert_eq!(
            links.iter().filter(|(node, _)| *node == branch_id).count(),
            2
        );

        // grandchild attributes made it into the push
        let leaf_ids: Vec<Uid> = links
            .iter()
            .filter(|(node, _)| *node == branch_id)
            .map(|(_, item)| *item)
            .collect();
        for leaf in leaf_ids {
            let target = ElementId::new(leaf, *ITEM_LABEL, Uid::NIL);
            let (index, _) = pushed
                .ops
                .iter()
                .enumerate()
                .find(|(_, op)| op.addr.element_id() == target)
                .expect("leaf label op");
            let mut label = TagValue::default();
            pushed.unmarshal_op_value(index, &mut label).unwrap();
            assert!(label.text.starts_with("leaf-"));
        }

        root_ctx.close();
        root_ctx.done().await;
    }
}
