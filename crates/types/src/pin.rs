//! The pin request model: what a client asks a host to synchronize.

use parity_scale_codec::{Decode, Encode};

use crate::impl_value;
use crate::selector::ItemSelector;
use crate::values::TagValue;

/// How long a pin lives and which direction state flows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub enum PinMode {
    /// Push one snapshot of the pinned state, then complete.
    #[default]
    Snapshot,
    /// Push a snapshot, then keep pushing changes until closed.
    MaintainSync,
    /// The transaction carries client state to commit; nothing is pushed.
    Commit,
}

/// Lifecycle states reported for a pin, carried in the tx header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub enum PinStatus {
    /// The pin exists but has not produced state yet.
    #[default]
    NotReady,
    /// State is being assembled or pushed.
    Syncing,
    /// The pushed transaction carries the complete pinned state.
    Synced,
    /// The pin finished; no further pushes will arrive.
    Complete,
    /// The pin was closed before completing.
    Closed,
}

/// The client-supplied record driving a pin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct PinRequest {
    /// Requested mode.
    pub mode: PinMode,
    /// What to invoke: a tag carrying a URI and/or a target UID.
    pub invoke: Option<TagValue>,
    /// Which nodes/attrs/items/edits to sync.
    pub selector: Option<ItemSelector>,
}

impl PinRequest {
    /// A compact label for logs.
    pub fn label(&self) -> String {
        let mut out = String::new();
        if let Some(invoke) = &self.invoke {
            out.push_str(&invoke.label());
        }
        if let Some(selector) = &self.selector {
            out.push('[');
            out.push_str(&selector.label());
            out.push(']');
        }
        out
    }
}

impl_value!(PinRequest);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn request_roundtrip() {
        let mut selector = ItemSelector::default();
        selector.select_node(crate::tag::Uid([0, 42]));
        let req = PinRequest {
            mode: PinMode::MaintainSync,
            invoke: Some(TagValue::from_uri("plexus://cabinets/~")),
            selector: Some(selector),
        };
        let bytes = codec::to_bytes_canonical(&req);
        let back: PinRequest = codec::from_bytes_canonical(&bytes).unwrap();
        assert_eq!(back, req);
    }
}
