//! The "cabinets" demo app: a static cell tree behind a stock module.

use std::sync::Arc;

use async_trait::async_trait;

use plexus_api::{
    AppContext, AppInstance, AppModule, Pin, Pinner, Request,
};
use plexus_app::{Cell, CellNode, CellPin, CellWriter, ITEM_CAPTION, ITEM_LABEL};
use plexus_task::Context;
use plexus_types::tag::Name;
use plexus_types::Result;

/// Label carried by the demo root cell.
pub const CABINETS_ROOT_LABEL: &str = "cabinets";

/// Label carried by the shelf that holds the demo bins.
pub const TOP_SHELF_LABEL: &str = "top shelf";

struct CabinetCell {
    node: CellNode,
    label: String,
    caption: String,
    shelves: Vec<Arc<CabinetCell>>,
}

impl CabinetCell {
    fn leaf(label: &str) -> Arc<CabinetCell> {
        CabinetCell::branch(label, Vec::new())
    }

    fn branch(label: &str, shelves: Vec<Arc<CabinetCell>>) -> Arc<CabinetCell> {
        Arc::new(CabinetCell {
            node: CellNode::new(),
            label: label.to_string(),
            caption: String::new(),
            shelves,
        })
    }
}

impl Cell for CabinetCell {
    fn root(&self) -> &CellNode {
        &self.node
    }

    fn pin_into(&self, pin: &CellPin) -> Result<()> {
        for shelf in &self.shelves {
            pin.add_child(shelf.clone());
        }
        Ok(())
    }

    fn marshal_attrs(&self, w: &mut dyn CellWriter) {
        w.push_text(*ITEM_LABEL, &self.label);
        w.push_text(*ITEM_CAPTION, &self.caption);
    }
}

struct CabinetsApp {
    ctx: Context,
    root: Arc<CabinetCell>,
}

#[async_trait]
impl Pinner for CabinetsApp {
    async fn serve_request(&self, req: Arc<Request>) -> Result<Arc<dyn Pin>> {
        CellPin::pin_and_serve(self.root.clone(), self.arc(), req)
    }
}

impl CabinetsApp {
    fn arc(&self) -> Arc<dyn AppInstance> {
        // instances hand CellPin an owned handle of themselves
        Arc::new(CabinetsApp {
            ctx: self.ctx.clone(),
            root: self.root.clone(),
        })
    }
}

#[async_trait]
impl AppInstance for CabinetsApp {
    fn context(&self) -> &Context {
        &self.ctx
    }

    async fn make_ready(&self, _req: &Request) -> Result<()> {
        Ok(())
    }
}

/// The demo module: registered under the `cabinets` alias, serving a root
/// cell with two shelves; the top shelf carries two bins of its own, so
/// pins must walk three levels.
pub fn demo_app() -> Arc<AppModule> {
    Arc::new(AppModule {
        spec: Name::from_expr("plexus.app.cabinets"),
        desc: "demo cabinets app".to_string(),
        version: "v0.1.0".to_string(),
        dependencies: Vec::new(),
        invocations: vec!["cabinets".to_string()],
        new_instance: Arc::new(|app: AppContext| {
            let top_shelf = CabinetCell::branch(
                TOP_SHELF_LABEL,
                vec![CabinetCell::leaf("red bin"), CabinetCell::leaf("blue bin")],
            );
            let root = Arc::new(CabinetCell {
                node: CellNode::new(),
                label: CABINETS_ROOT_LABEL.to_string(),
                caption: "demo cabinet row".to_string(),
                shelves: vec![top_shelf, CabinetCell::leaf("bottom shelf")],
            });
            Ok(Arc::new(CabinetsApp { ctx: app.ctx, root }))
        }),
    })
}
