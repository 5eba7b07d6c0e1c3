//! Element coordinates and their LSM key forms.
//!
//! An [`Address`] names one CRDT entry: `(node, attr, item)` locate the
//! element, `edit` its revision, `from` its author. The serialized key
//! forms ([`ElementLsm`], [`AddressLsm`]) are laid out so plain byte
//! comparison reproduces [`Address::compare`] — in particular the edit
//! words are stored bit-inverted, so the newest edit of an element sorts
//! first in any forward scan. This pairs with storage engines that iterate
//! lexicographically and removes the need for a separate "latest edit"
//! index.

use crate::tag::Uid;

/// Byte length of [`ElementLsm`].
pub const ELEMENT_LSM_LEN: usize = 48;

/// Byte length of [`AddressLsm`].
pub const ADDRESS_LSM_LEN: usize = 80;

/// The coordinate of one CRDT entry.
///
/// Synthesized at op construction, serialized into tx bytes, deserialized
/// on read, and never mutated after sorting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Address {
    /// Top-level addressable container.
    pub node: Uid,
    /// Attribute schema UID; determines how the item and value read.
    pub attr: Uid,
    /// Inline element key: coordinates, hash, timestamp, or child link.
    pub item: Uid,
    /// Revision UID; reverse-ordered so the newest edit sorts first.
    pub edit: Uid,
    /// Author UID of this entry.
    pub from: Uid,
}

/// The `(node, attr, item)` triple locating an element independent of its
/// revisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    /// Top-level addressable container.
    pub node: Uid,
    /// Attribute schema UID.
    pub attr: Uid,
    /// Inline element key.
    pub item: Uid,
}

impl ElementId {
    /// Assembles an element ID from its three coordinates.
    pub fn new(node: Uid, attr: Uid, item: Uid) -> ElementId {
        ElementId { node, attr, item }
    }

    /// The fixed-layout big-endian key form.
    pub fn as_lsm(&self) -> ElementLsm {
        let mut lsm = [0u8; ELEMENT_LSM_LEN];
        lsm[0..16].copy_from_slice(&self.node.to_bytes());
        lsm[16..32].copy_from_slice(&self.attr.to_bytes());
        lsm[32..48].copy_from_slice(&self.item.to_bytes());
        ElementLsm(lsm)
    }
}

impl Address {
    /// An address with only the element coordinates set.
    pub fn for_element(elem: ElementId) -> Address {
        Address {
            node: elem.node,
            attr: elem.attr,
            item: elem.item,
            ..Address::default()
        }
    }

    /// The element triple of this address.
    pub fn element_id(&self) -> ElementId {
        ElementId {
            node: self.node,
            attr: self.attr,
            item: self.item,
        }
    }

    /// Total order over addresses: `(node, attr, item)` ascending, then
    /// `edit` **descending** (newest revision first), then `from`
    /// ascending.
    pub fn compare(&self, other: &Address) -> std::cmp::Ordering {
        self.compare_element(other)
            .then_with(|| other.edit.cmp(&self.edit))
            .then_with(|| self.from.cmp(&other.from))
    }

    /// As [`Address::compare`] but stops before the edit UID.
    pub fn compare_element(&self, other: &Address) -> std::cmp::Ordering {
        self.node
            .cmp(&other.node)
            .then_with(|| self.attr.cmp(&other.attr))
            .then_with(|| self.item.cmp(&other.item))
    }

    /// The fixed-layout big-endian key form. Byte order equals
    /// [`Address::compare`] order: the edit words are stored bit-inverted.
    pub fn as_lsm(&self) -> AddressLsm {
        let mut lsm = [0u8; ADDRESS_LSM_LEN];
        lsm[0..16].copy_from_slice(&self.node.to_bytes());
        lsm[16..32].copy_from_slice(&self.attr.to_bytes());
        lsm[32..48].copy_from_slice(&self.item.to_bytes());
        let inverted = Uid([!self.edit.0[0], !self.edit.0[1]]);
        lsm[48..64].copy_from_slice(&inverted.to_bytes());
        lsm[64..80].copy_from_slice(&self.from.to_bytes());
        AddressLsm(lsm)
    }

    /// Inverse of [`Address::as_lsm`].
    pub fn from_lsm(lsm: &AddressLsm) -> Address {
        let b = &lsm.0;
        let take = |at: usize| {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&b[at..at + 16]);
            Uid::from_bytes(buf)
        };
        let inverted = take(48);
        Address {
            node: take(0),
            attr: take(16),
            item: take(32),
            edit: Uid([!inverted.0[0], !inverted.0[1]]),
            from: take(64),
        }
    }

    /// The element-key prefix of the full key form.
    pub fn element_lsm(&self) -> ElementLsm {
        self.element_id().as_lsm()
    }
}

/// The 48-byte big-endian key of an [`ElementId`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementLsm(pub [u8; ELEMENT_LSM_LEN]);

impl Default for ElementLsm {
    fn default() -> Self {
        ElementLsm([0u8; ELEMENT_LSM_LEN])
    }
}

impl ElementLsm {
    /// The least element key.
    pub const MIN: ElementLsm = ElementLsm([0u8; ELEMENT_LSM_LEN]);

    /// The greatest element key.
    pub const MAX: ElementLsm = ElementLsm([0xFF; ELEMENT_LSM_LEN]);

    /// Recovers the element triple.
    pub fn to_element_id(&self) -> ElementId {
        let take = |at: usize| {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&self.0[at..at + 16]);
            Uid::from_bytes(buf)
        };
        ElementId {
            node: take(0),
            attr: take(16),
            item: take(32),
        }
    }

    /// Big-endian increment of the item field, forming the half-open
    /// successor of this key. Returns true on overflow (item wrapped to
    /// zero).
    pub fn increment_item(&mut self) -> bool {
        for i in (32..ELEMENT_LSM_LEN).rev() {
            let (digit, wrapped) = self.0[i].overflowing_add(1);
            self.0[i] = digit;
            if !wrapped {
                return false;
            }
        }
        true
    }

    /// Big-endian decrement of the item field. Returns true on underflow
    /// (item wrapped to all ones).
    pub fn decrement_item(&mut self) -> bool {
        for i in (32..ELEMENT_LSM_LEN).rev() {
            let (digit, wrapped) = self.0[i].overflowing_sub(1);
            self.0[i] = digit;
            if !wrapped {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Debug for ElementLsm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.to_element_id();
        write!(f, "ElementLsm({}/{}/{})", id.node, id.attr, id.item)
    }
}

/// The 80-byte big-endian key of a full [`Address`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressLsm(pub [u8; ADDRESS_LSM_LEN]);

impl Default for AddressLsm {
    fn default() -> Self {
        AddressLsm([0u8; ADDRESS_LSM_LEN])
    }
}

impl AddressLsm {
    /// The element-key prefix of this key.
    pub fn element(&self) -> ElementLsm {
        let mut out = [0u8; ELEMENT_LSM_LEN];
        out.copy_from_slice(&self.0[..ELEMENT_LSM_LEN]);
        ElementLsm(out)
    }
}

impl std::fmt::Debug for AddressLsm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let addr = Address::from_lsm(self);
        write!(
            f,
            "AddressLsm({}/{}/{}@{})",
            addr.node, addr.attr, addr.item, addr.edit
        )
    }
}
