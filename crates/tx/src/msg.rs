//! The transaction message, its envelope and header, and op-level
//! operations.

use parity_scale_codec::{Decode, Encode};

use plexus_types::error::stock;
use plexus_types::tag::Uid;
use plexus_types::{Address, ElementId, Error, ErrorKind, PinRequest, PinStatus, Result, Value};

use crate::pool;

/// Number of delta-encoded address words per op: two words each for node,
/// attr, item, and edit.
pub const TX_FIELD_COUNT: usize = 8;

/// Routing identity of a transaction: who minted it and where its header
/// begins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct TxEnvelope {
    /// High word of the transaction UID.
    pub tx_id_0: u64,
    /// Low word of the transaction UID.
    pub tx_id_1: u64,
    /// High word of the author UID.
    pub from_id_0: u64,
    /// Low word of the author UID.
    pub from_id_1: u64,
    /// Bytes to skip between envelope and header, reserved for a keyring
    /// or crypto prefix.
    pub header_offset: u64,
    /// Number of ops in the operation table.
    pub op_count: u64,
}

impl TxEnvelope {
    /// The transaction UID.
    pub fn tx_id(&self) -> Uid {
        Uid([self.tx_id_0, self.tx_id_1])
    }

    /// Sets the transaction UID.
    pub fn set_tx_id(&mut self, id: Uid) {
        self.tx_id_0 = id.0[0];
        self.tx_id_1 = id.0[1];
    }

    /// The author UID.
    pub fn from_id(&self) -> Uid {
        Uid([self.from_id_0, self.from_id_1])
    }

    /// Sets the author UID.
    pub fn set_from_id(&mut self, id: Uid) {
        self.from_id_0 = id.0[0];
        self.from_id_1 = id.0[1];
    }
}

/// Public routing fields of a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct TxHeader {
    /// High word of the originating request/context UID.
    pub context_id_0: u64,
    /// Low word of the originating request/context UID.
    pub context_id_1: u64,
    /// High word of the recipient UID, if directed.
    pub recipient_0: u64,
    /// Low word of the recipient UID, if directed.
    pub recipient_1: u64,
    /// The pin request this transaction invokes or answers, if any.
    pub request: Option<PinRequest>,
    /// Pin status this transaction reports.
    pub status: PinStatus,
}

impl TxHeader {
    /// The originating request/context UID.
    pub fn context_id(&self) -> Uid {
        Uid([self.context_id_0, self.context_id_1])
    }

    /// Sets the originating request/context UID.
    pub fn set_context_id(&mut self, id: Uid) {
        self.context_id_0 = id.0[0];
        self.context_id_1 = id.0[1];
    }

    /// The recipient UID.
    pub fn recipient(&self) -> Uid {
        Uid([self.recipient_0, self.recipient_1])
    }

    /// Sets the recipient UID.
    pub fn set_recipient(&mut self, id: Uid) {
        self.recipient_0 = id.0[0];
        self.recipient_1 = id.0[1];
    }
}

/// Per-op flag byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxOpFlags(pub u8);

impl TxOpFlags {
    /// Writes or revises the addressed element.
    pub const UPSERT: TxOpFlags = TxOpFlags(0x01);
    /// Removes the addressed element.
    pub const DELETE: TxOpFlags = TxOpFlags(0x02);
    /// A meta op: consumed by the session layer, never stored.
    pub const META_OP: TxOpFlags = TxOpFlags(0x04);

    /// True when every bit of `other` is set in `self`.
    pub fn contains(&self, other: TxOpFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Flag byte leading every op payload. The low nibble lists up to four
/// inline 16-byte UIDs that precede the value bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValueHeaderFlags(pub u8);

impl ValueHeaderFlags {
    /// The payload is preceded by the author UID.
    pub const FROM_ID: ValueHeaderFlags = ValueHeaderFlags(0x01);

    /// Number of inline UIDs announced by the low nibble.
    pub fn inline_uids(&self) -> usize {
        (self.0 & 0x0F).count_ones() as usize
    }
}

/// One transaction op: the most granular unit of change. The serialized
/// payload lives in the owning transaction's data store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxOp {
    /// The element/edit coordinate this op applies to.
    pub addr: Address,
    /// What the op does.
    pub flags: TxOpFlags,
    /// Reference to a related op or entry; opaque to the codec.
    pub citation: u64,
    /// Byte offset of the payload in the data store.
    pub data_ofs: u64,
    /// Byte length of the payload.
    pub data_len: u64,
}

/// A transaction: ordered ops plus the shared byte store their payloads
/// reference.
#[derive(Debug)]
pub struct TxMsg {
    /// Routing identity.
    pub envelope: TxEnvelope,
    /// Public routing fields.
    pub header: TxHeader,
    /// The operation table; totally ordered once normalized.
    pub ops: Vec<TxOp>,
    /// Opaque payload bytes referenced by ops.
    pub data_store: Vec<u8>,
    /// True once ops are sorted and every edit UID is non-nil.
    pub normalized: bool,
    /// Edit UID stamped into ops appended without one; nil unless the
    /// transaction was minted through [`TxMsg::genesis`].
    pub edit_id: Uid,
}

impl TxMsg {
    /// A blank transaction drawing its buffers from the process pool.
    pub fn acquire() -> TxMsg {
        let bufs = pool::acquire_buffers();
        TxMsg {
            envelope: TxEnvelope::default(),
            header: TxHeader::default(),
            ops: bufs.ops,
            data_store: bufs.data,
            normalized: false,
            edit_id: Uid::NIL,
        }
    }

    /// A fresh transaction stamped with a new tx UID and a genesis edit
    /// UID, ready for [`TxMsg::upsert`] calls.
    pub fn genesis() -> TxMsg {
        let mut tx = TxMsg::acquire();
        tx.envelope.set_tx_id(Uid::now());
        tx.edit_id = Uid::genesis_edit();
        tx
    }

    /// Appends an upsert of `value` at `(node, attr, item)`.
    pub fn upsert(
        &mut self,
        node: Uid,
        attr: Uid,
        item: Uid,
        value: Option<&dyn Value>,
    ) -> Result<()> {
        let mut op = TxOp {
            flags: TxOpFlags::UPSERT,
            ..TxOp::default()
        };
        op.addr.node = node;
        op.addr.attr = attr;
        op.addr.item = item;
        self.marshal_op(&mut op, value)
    }

    /// Appends a delete of the element, with an optional tombstone value.
    pub fn delete(&mut self, elem: ElementId, value: Option<&dyn Value>) -> Result<()> {
        let mut op = TxOp {
            flags: TxOpFlags::DELETE,
            addr: Address::for_element(elem),
            ..TxOp::default()
        };
        self.marshal_op(&mut op, value)
    }

    /// Marshals `value` into the data store and appends `op` referencing
    /// it. The payload leads with a value header carrying the author UID
    /// inline; an op without an edit UID is stamped with the transaction's
    /// [`TxMsg::edit_id`].
    pub fn marshal_op(&mut self, op: &mut TxOp, value: Option<&dyn Value>) -> Result<()> {
        let start = self.data_store.len();

        // value header and inline UIDs
        self.data_store.push(ValueHeaderFlags::FROM_ID.0);
        self.data_store
            .extend_from_slice(&self.envelope.from_id_0.to_be_bytes());
        self.data_store
            .extend_from_slice(&self.envelope.from_id_1.to_be_bytes());

        if let Some(value) = value {
            value.marshal_to_store(&mut self.data_store)?;
        }

        op.data_ofs = start as u64;
        op.data_len = (self.data_store.len() - start) as u64;
        if op.addr.edit.is_nil() {
            op.addr.edit = self.edit_id;
        }
        self.push_op(*op);
        Ok(())
    }

    /// Appends `op` with pre-serialized payload bytes (value header
    /// included). Low-level; used by relays that copy payloads verbatim.
    pub fn marshal_op_raw(&mut self, op: &mut TxOp, payload: &[u8]) {
        op.data_ofs = self.data_store.len() as u64;
        op.data_len = payload.len() as u64;
        self.data_store.extend_from_slice(payload);
        if op.addr.edit.is_nil() {
            op.addr.edit = self.edit_id;
        }
        self.push_op(*op);
    }

    fn push_op(&mut self, op: TxOp) {
        self.ops.push(op);
        self.envelope.op_count = self.ops.len() as u64;
        self.normalized = false;
    }

    /// Validates and orders this transaction prior to handling: every op
    /// must carry a non-nil edit UID (else [`ErrorKind::BadTxEdit`]), and
    /// ops sort by [`Address::compare`] — newest edit first within an
    /// element. A no-op when already normalized, unless `force` is set.
    pub fn normalize(&mut self, force: bool) -> Result<()> {
        if self.normalized && !force {
            return Ok(());
        }
        for op in &self.ops {
            if op.addr.edit.is_nil() {
                return Err(ErrorKind::BadTxEdit.err("op carries a nil edit UID"));
            }
        }
        self.ops.sort_by(|a, b| a.addr.compare(&b.addr));
        self.normalized = true;
        Ok(())
    }

    /// Unmarshals the payload of `ops[index]` into `dst`, skipping the
    /// value header and its inline UIDs.
    pub fn unmarshal_op_value(&self, index: usize, dst: &mut dyn Value) -> Result<()> {
        let op = self
            .ops
            .get(index)
            .ok_or_else(stock::malformed_tx)?;
        let mut ofs = op.data_ofs as usize;
        let end = ofs
            .checked_add(op.data_len as usize)
            .filter(|end| *end <= self.data_store.len())
            .ok_or_else(|| ErrorKind::BadTxOp.err("op data span out of bounds"))?;
        if op.data_len < 1 {
            return Err(ErrorKind::BadTxOp.err("op carries no payload"));
        }

        let header = ValueHeaderFlags(self.data_store[ofs]);
        ofs += 1 + 16 * header.inline_uids();
        if ofs > end {
            return Err(ErrorKind::BadTxOp.err("value header overruns payload"));
        }
        dst.unmarshal(&self.data_store[ofs..end])
    }

    /// Linear scan for the first op at `(attr, item)`; unmarshals its
    /// payload into `dst`. Misses report `AttrNotFound`
    /// ([`ErrorKind::ItemNotFound`]).
    pub fn extract_value(&self, attr: Uid, item: Uid, dst: &mut dyn Value) -> Result<()> {
        for (i, op) in self.ops.iter().enumerate() {
            if op.addr.attr == attr && op.addr.item == item {
                return self.unmarshal_op_value(i, dst);
            }
        }
        Err(Error::attr_not_found(format!("no op for attr {attr}")))
    }

    /// Normalizes, then binary-searches for `target` and unmarshals the
    /// newest edit's payload into `dst`. Wildcard item UIDs are not
    /// supported and report [`ErrorKind::Unimplemented`].
    pub fn load_value(&mut self, target: &ElementId, dst: &mut dyn Value) -> Result<()> {
        self.normalize(false)?;

        if target.item.is_wildcard() {
            return Err(
                ErrorKind::Unimplemented.err("load_value: wildcard item range scan")
            );
        }

        let mut idx = self
            .ops
            .binary_search_by(|op| op.addr.element_id().cmp(target))
            .map_err(|_| Error::attr_not_found(format!("no op for element {target:?}")))?;

        // equal elements differ only in edit; the newest sorts first
        while idx > 0 && self.ops[idx - 1].addr.element_id() == *target {
            idx -= 1;
        }
        self.unmarshal_op_value(idx, dst)
    }

    /// A deterministic upper bound on this transaction's serialized size.
    pub fn ceiling_size(&self) -> usize {
        // per op: flag byte + four 10-byte varints + mask varint + 8 words
        const OP_CEILING: usize = 1 + 4 * 10 + 10 + TX_FIELD_COUNT * 8;
        let head = plexus_types::codec::to_bytes_canonical(&self.envelope).len()
            + plexus_types::codec::to_bytes_canonical(&self.header).len()
            + 2 * 10;
        crate::TX_PREAMBLE_SIZE + head + self.ops.len() * OP_CEILING + self.data_store.len()
    }

    /// Sets the originating context UID; see [`TxHeader::set_context_id`].
    pub fn set_context_id(&mut self, id: Uid) {
        self.header.set_context_id(id);
    }
}

impl Drop for TxMsg {
    fn drop(&mut self) {
        pool::recycle(std::mem::take(&mut self.ops), std::mem::take(&mut self.data_store));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_types::values::{Login, TagValue};

    fn uid(v: u64) -> Uid {
        Uid([0, v])
    }

    #[test]
    fn normalize_rejects_nil_edit() {
        let mut tx = TxMsg::acquire(); // no genesis edit stamp
        tx.upsert(uid(1), uid(2), uid(3), None).unwrap();
        let err = tx.normalize(false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadTxEdit);
    }

    #[test]
    fn normalize_sorts_newest_edit_first() {
        let mut tx = TxMsg::acquire();
        let mut older = TxOp {
            flags: TxOpFlags::UPSERT,
            ..TxOp::default()
        };
        older.addr.node = uid(1);
        older.addr.attr = uid(2);
        older.addr.item = uid(3);
        older.addr.edit = uid(100);
        let mut newer = older;
        newer.addr.edit = uid(200);

        tx.marshal_op(&mut older, None).unwrap();
        tx.marshal_op(&mut newer, None).unwrap();
        tx.normalize(false).unwrap();

        assert_eq!(tx.ops[0].addr.edit, uid(200));
        assert_eq!(tx.ops[1].addr.edit, uid(100));
    }

    #[test]
    fn extract_value_hits_and_misses() {
        let mut tx = TxMsg::genesis();
        let login = Login {
            member: Some(TagValue::from_text("astar")),
            host_address: "batwing ave".to_string(),
        };
        tx.upsert(uid(1), uid(2), uid(3), Some(&login)).unwrap();

        let mut out = Login::default();
        tx.extract_value(uid(2), uid(3), &mut out).unwrap();
        assert_eq!(out, login);

        let miss = tx.extract_value(uid(2), uid(99), &mut out).unwrap_err();
        assert_eq!(miss.kind, ErrorKind::ItemNotFound);
    }

    #[test]
    fn load_value_picks_newest_edit() {
        let mut tx = TxMsg::acquire();
        for (edit, text) in [(100u64, "old"), (300, "newest"), (200, "mid")] {
            let mut op = TxOp {
                flags: TxOpFlags::UPSERT,
                ..TxOp::default()
            };
            op.addr.node = uid(1);
            op.addr.attr = uid(2);
            op.addr.item = uid(3);
            op.addr.edit = uid(edit);
            tx.marshal_op(&mut op, Some(&TagValue::from_text(text)))
                .unwrap();
        }

        let mut out = TagValue::default();
        tx.load_value(&ElementId::new(uid(1), uid(2), uid(3)), &mut out)
            .unwrap();
        assert_eq!(out.text, "newest");
    }

    #[test]
    fn load_value_rejects_wildcard_item() {
        let mut tx = TxMsg::genesis();
        tx.upsert(uid(1), uid(2), uid(3), None).unwrap();
        let mut out = TagValue::default();
        let err = tx
            .load_value(&ElementId::new(uid(1), uid(2), Uid::WILDCARD), &mut out)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unimplemented);
    }

    #[test]
    fn genesis_stamps_edits() {
        let mut tx = TxMsg::genesis();
        tx.upsert(uid(1), uid(2), uid(3), None).unwrap();
        assert!(tx.ops[0].addr.edit.is_set());
        assert!(tx.normalize(false).is_ok());
    }

    #[test]
    fn unmarshal_rejects_out_of_bounds_span() {
        let mut tx = TxMsg::genesis();
        tx.upsert(uid(1), uid(2), uid(3), None).unwrap();
        tx.ops[0].data_len = 1_000_000;
        let mut out = TagValue::default();
        let err = tx.unmarshal_op_value(0, &mut out).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadTxOp);
    }
}
