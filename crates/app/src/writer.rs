//! Marshaling a cell's attributes into an in-progress transaction.

use plexus_tx::{TxMsg, TxOp, TxOpFlags};
use plexus_types::tag::Uid;
use plexus_types::values::TagValue;
use plexus_types::{Error, Result, Value};

use crate::attrs::ITEM_LINK;

/// How a cell pushes its pinned attributes.
///
/// The first error latches; later pushes become no-ops so cells can
/// marshal unconditionally and the pin surfaces one failure at the end.
pub trait CellWriter {
    /// Pushes a prepared op and value.
    fn push(&mut self, op: &mut TxOp, value: Option<&dyn Value>);

    /// Pushes a text attribute bound to an item UID.
    fn push_text_with_id(&mut self, attr: Uid, item: Uid, text: &str);

    /// Pushes a value attribute bound to an item UID.
    fn push_item_with_id(&mut self, attr: Uid, item: Uid, value: &dyn Value);

    /// Pushes a text attribute on the cell's default item; empty text is
    /// skipped.
    fn push_text(&mut self, attr: Uid, text: &str);

    /// Pushes a value attribute on the cell's default item.
    fn push_item(&mut self, attr: Uid, value: &dyn Value);

    /// Pushes a child link from this cell to `child_id`.
    fn push_child_link(&mut self, child_id: Uid);
}

/// The stock [`CellWriter`] appending upserts for one cell to a
/// transaction.
pub struct TxCellWriter<'a> {
    tx: &'a mut TxMsg,
    node: Uid,
    err: Option<Error>,
}

impl<'a> TxCellWriter<'a> {
    /// A writer appending attributes of the cell `node` to `tx`.
    pub fn new(tx: &'a mut TxMsg, node: Uid) -> TxCellWriter<'a> {
        TxCellWriter {
            tx,
            node,
            err: None,
        }
    }

    /// Re-targets this writer at another cell.
    pub fn set_node(&mut self, node: Uid) {
        self.node = node;
    }

    /// The first error encountered, if any.
    pub fn finish(self) -> Result<()> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl CellWriter for TxCellWriter<'_> {
    fn push(&mut self, op: &mut TxOp, value: Option<&dyn Value>) {
        if self.err.is_some() {
            return;
        }
        if let Err(err) = self.tx.marshal_op(op, value) {
            self.err = Some(err);
        }
    }

    fn push_text_with_id(&mut self, attr: Uid, item: Uid, text: &str) {
        let value = TagValue::from_text(text);
        self.push_item_with_id(attr, item, &value);
    }

    fn push_item_with_id(&mut self, attr: Uid, item: Uid, value: &dyn Value) {
        let mut op = TxOp {
            flags: TxOpFlags::UPSERT,
            ..TxOp::default()
        };
        op.addr.node = self.node;
        op.addr.attr = attr;
        op.addr.item = item;
        self.push(&mut op, Some(value));
    }

    fn push_text(&mut self, attr: Uid, text: &str) {
        if text.is_empty() {
            return;
        }
        self.push_text_with_id(attr, Uid::NIL, text);
    }

    fn push_item(&mut self, attr: Uid, value: &dyn Value) {
        self.push_item_with_id(attr, Uid::NIL, value);
    }

    fn push_child_link(&mut self, child_id: Uid) {
        self.push_item_with_id(*ITEM_LINK, child_id, &TagValue::from_uid(child_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::ITEM_LABEL;

    #[test]
    fn writer_appends_upserts() {
        let mut tx = TxMsg::genesis();
        let node = Uid([0, 7]);
        let mut w = TxCellWriter::new(&mut tx, node);
        w.push_text(*ITEM_LABEL, "shelf");
        w.push_text(*ITEM_LABEL, ""); // skipped
        w.finish().unwrap();

        assert_eq!(tx.ops.len(), 1);
        assert_eq!(tx.ops[0].addr.node, node);
        assert_eq!(tx.ops[0].addr.attr, *ITEM_LABEL);
        assert!(tx.ops[0].flags.contains(TxOpFlags::UPSERT));
    }
}
