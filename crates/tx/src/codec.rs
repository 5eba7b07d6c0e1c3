//! Streaming serialization: preamble, head, delta-encoded op table.

use std::io::{Read, Write};

use plexus_types::codec::{
    from_bytes_canonical, put_uvarint, take_u64_be, take_uvarint, to_bytes_canonical,
};
use plexus_types::{ErrorKind, Result};

use crate::msg::{TxMsg, TxOp, TxOpFlags, TX_FIELD_COUNT};
use crate::{TX_PREAMBLE_MARKER, TX_PREAMBLE_SIZE, TX_PREAMBLE_VERSION};

fn op_fields(op: &TxOp) -> [u64; TX_FIELD_COUNT] {
    [
        op.addr.node.0[0],
        op.addr.node.0[1],
        op.addr.attr.0[0],
        op.addr.attr.0[1],
        op.addr.item.0[0],
        op.addr.item.0[1],
        op.addr.edit.0[0],
        op.addr.edit.0[1],
    ]
}

fn stream_err(e: std::io::Error) -> plexus_types::Error {
    ErrorKind::NotConnected.wrap(e)
}

impl TxMsg {
    /// Serializes the preamble, envelope, header, and op table into `dst`
    /// (replacing its contents). The data store is not included; see
    /// [`TxMsg::marshal_to_buffer`].
    ///
    /// Adjacent ops usually share address words, so each op emits only the
    /// words differing from its predecessor, recorded in a bitmask. The
    /// decoder mirrors this, seeding a zeroed previous-op state.
    pub fn marshal_head_and_ops(&mut self, dst: &mut Vec<u8>) {
        dst.clear();
        dst.resize(TX_PREAMBLE_SIZE, 0);

        self.envelope.op_count = self.ops.len() as u64;
        self.envelope.header_offset = 0; // reserved keyring/crypto prefix
        let envelope = to_bytes_canonical(&self.envelope);
        put_uvarint(dst, envelope.len() as u64);
        dst.extend_from_slice(&envelope);

        let header = to_bytes_canonical(&self.header);
        put_uvarint(dst, header.len() as u64);
        dst.extend_from_slice(&header);

        let mut prev = [0u64; TX_FIELD_COUNT];
        for op in &self.ops {
            dst.push(op.flags.0);
            put_uvarint(dst, op.citation);
            put_uvarint(dst, op.data_ofs);
            put_uvarint(dst, op.data_len);
            put_uvarint(dst, 0); // skip bytes, reserved

            let cur = op_fields(op);
            let mut has_fields = 0u64;
            for (i, word) in cur.iter().enumerate() {
                if *word != prev[i] {
                    has_fields |= 1 << i;
                }
            }
            put_uvarint(dst, has_fields);
            for (i, word) in cur.iter().enumerate() {
                if has_fields & (1 << i) != 0 {
                    dst.extend_from_slice(&word.to_be_bytes());
                }
            }
            prev = cur;
        }

        let head_len = dst.len() as u32;
        dst[0] = (TX_PREAMBLE_MARKER >> 16) as u8;
        dst[1] = (TX_PREAMBLE_MARKER >> 8) as u8;
        dst[2] = TX_PREAMBLE_MARKER as u8;
        dst[3] = TX_PREAMBLE_VERSION;
        dst[4..8].copy_from_slice(&head_len.to_be_bytes());
        dst[8..12].copy_from_slice(&(self.data_store.len() as u32).to_be_bytes());
    }

    /// Serializes the whole transaction into `dst`, replacing its
    /// contents.
    pub fn marshal_to_buffer(&mut self, dst: &mut Vec<u8>) {
        self.marshal_head_and_ops(dst);
        dst.extend_from_slice(&self.data_store);
    }

    /// Writes the whole transaction to `w`. Stream failures surface as
    /// [`ErrorKind::NotConnected`].
    pub fn write_to(&mut self, w: &mut dyn Write) -> Result<()> {
        let mut scratch = Vec::with_capacity(TX_PREAMBLE_SIZE + 256);
        self.marshal_head_and_ops(&mut scratch);
        w.write_all(&scratch).map_err(stream_err)?;
        w.write_all(&self.data_store).map_err(stream_err)?;
        Ok(())
    }

    /// Rebuilds envelope, header, and ops from head bytes (preamble
    /// excluded). Every structural fault reports
    /// [`ErrorKind::MalformedTx`].
    pub fn unmarshal_head(&mut self, src: &[u8]) -> Result<()> {
        let mut pos = 0usize;

        let take_span = |pos: &mut usize, len: usize| -> Result<std::ops::Range<usize>> {
            let end = pos
                .checked_add(len)
                .filter(|end| *end <= src.len())
                .ok_or_else(|| ErrorKind::MalformedTx.err("truncated tx head"))?;
            let span = *pos..end;
            *pos = end;
            Ok(span)
        };

        let env_len = take_uvarint(src, &mut pos)? as usize;
        self.envelope = from_bytes_canonical(&src[take_span(&mut pos, env_len)?])?;

        // reserved keyring/crypto prefix
        take_span(&mut pos, self.envelope.header_offset as usize)?;

        let header_len = take_uvarint(src, &mut pos)? as usize;
        self.header = from_bytes_canonical(&src[take_span(&mut pos, header_len)?])?;

        let mut cur = [0u64; TX_FIELD_COUNT];
        self.ops.clear();
        for _ in 0..self.envelope.op_count {
            let flags = TxOpFlags(
                *src.get(pos)
                    .ok_or_else(|| ErrorKind::MalformedTx.err("truncated op flags"))?,
            );
            pos += 1;

            let citation = take_uvarint(src, &mut pos)?;
            let data_ofs = take_uvarint(src, &mut pos)?;
            let data_len = take_uvarint(src, &mut pos)?;

            let skip = take_uvarint(src, &mut pos)? as usize;
            take_span(&mut pos, skip)?;

            let has_fields = take_uvarint(src, &mut pos)?;
            for (i, word) in cur.iter_mut().enumerate() {
                if has_fields & (1 << i) != 0 {
                    *word = take_u64_be(src, &mut pos)?;
                }
            }

            let mut op = TxOp {
                flags,
                citation,
                data_ofs,
                data_len,
                ..TxOp::default()
            };
            op.addr.node.0 = [cur[0], cur[1]];
            op.addr.attr.0 = [cur[2], cur[3]];
            op.addr.item.0 = [cur[4], cur[5]];
            op.addr.edit.0 = [cur[6], cur[7]];
            self.ops.push(op);
        }

        // renormalize later; remote order is not trusted
        self.normalized = false;
        Ok(())
    }

    /// Blocks reading one whole transaction from `r`.
    ///
    /// Rejects a bad marker or an older version with
    /// [`ErrorKind::MalformedTx`]; stream failures surface as
    /// [`ErrorKind::NotConnected`].
    pub fn read_from(r: &mut dyn Read) -> Result<TxMsg> {
        let mut preamble = [0u8; TX_PREAMBLE_SIZE];
        r.read_exact(&mut preamble).map_err(stream_err)?;

        let marker = u32::from(preamble[0]) << 16
            | u32::from(preamble[1]) << 8
            | u32::from(preamble[2]);
        if marker != TX_PREAMBLE_MARKER {
            return Err(ErrorKind::MalformedTx.err("bad preamble marker"));
        }
        if preamble[3] < TX_PREAMBLE_VERSION {
            return Err(ErrorKind::MalformedTx.err("unsupported tx version"));
        }

        let head_len = u32::from_be_bytes([preamble[4], preamble[5], preamble[6], preamble[7]])
            as usize;
        let data_len = u32::from_be_bytes([preamble[8], preamble[9], preamble[10], preamble[11]])
            as usize;
        if head_len < TX_PREAMBLE_SIZE {
            return Err(ErrorKind::MalformedTx.err("head length under preamble size"));
        }

        let mut tx = TxMsg::acquire();

        // one buffer sized for the larger of head and data serves both reads
        let mut buf = std::mem::take(&mut tx.data_store);
        buf.reserve((head_len - TX_PREAMBLE_SIZE).max(data_len));
        buf.resize(head_len - TX_PREAMBLE_SIZE, 0);
        r.read_exact(&mut buf).map_err(stream_err)?;
        tx.unmarshal_head(&buf)?;

        buf.clear();
        buf.resize(data_len, 0);
        r.read_exact(&mut buf).map_err(stream_err)?;
        tx.data_store = buf;

        tracing::trace!(target: "tx", ops = tx.ops.len(), data = data_len, "read tx");
        Ok(tx)
    }
}
