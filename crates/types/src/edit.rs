//! The per-node edit table: element to latest-edit mapping.
//!
//! Storage backends that materialize one of these avoid re-scanning an
//! element's revision history to find its head. Updates are serialized per
//! node. The table is not consulted during transaction normalization.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::address::ElementId;
use crate::tag::Uid;

#[derive(Default)]
struct NodeEdits {
    by_element: HashMap<(Uid, Uid), Uid>,
}

/// Maps each element to the latest edit UID seen for it.
#[derive(Default)]
pub struct EditTable {
    nodes: Mutex<HashMap<Uid, NodeEdits>>,
}

impl EditTable {
    /// An empty table.
    pub fn new() -> EditTable {
        EditTable::default()
    }

    /// The latest edit recorded for `elem`, if any.
    pub fn latest(&self, elem: &ElementId) -> Option<Uid> {
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes
            .get(&elem.node)
            .and_then(|n| n.by_element.get(&(elem.attr, elem.item)))
            .copied()
    }

    /// Records `edit` for `elem` if it is newer than the current head.
    /// Returns true when the head advanced.
    pub fn record(&self, elem: &ElementId, edit: Uid) -> bool {
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        let node = nodes.entry(elem.node).or_default();
        let head = node.by_element.entry((elem.attr, elem.item)).or_insert(Uid::NIL);
        if edit > *head {
            *head = edit;
            true
        } else {
            false
        }
    }

    /// Drops every entry under `node`.
    pub fn forget_node(&self, node: Uid) {
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.remove(&node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_advances_monotonically() {
        let table = EditTable::new();
        let elem = ElementId::new(Uid([0, 1]), Uid([0, 2]), Uid([0, 3]));

        assert_eq!(table.latest(&elem), None);
        assert!(table.record(&elem, Uid([0, 10])));
        assert!(!table.record(&elem, Uid([0, 5])));
        assert!(table.record(&elem, Uid([0, 20])));
        assert_eq!(table.latest(&elem), Some(Uid([0, 20])));

        table.forget_node(elem.node);
        assert_eq!(table.latest(&elem), None);
    }
}
