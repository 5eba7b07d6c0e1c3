//! Defines the canonical, deterministic binary codec for all wire values.
//!
//! This module provides simple wrappers around `parity-scale-codec` (SCALE),
//! chosen for its compact and deterministic properties. By centralizing the
//! codec logic here in the base `types` crate, every component serializes
//! attribute payloads, transaction envelopes, and headers identically, so
//! independent clients derive byte-equal transactions from equal inputs.
//!
//! The module also carries the unsigned LEB128 varint helpers shared by the
//! transaction codec; all fixed-width integers on the wire are big-endian.

use parity_scale_codec::{Decode, DecodeAll, Encode};

use crate::error::{Error, ErrorKind};

/// Encodes a value into its canonical byte representation.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from its canonical byte representation, rejecting
/// trailing garbage. Failures surface as [`ErrorKind::MalformedTx`].
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, Error> {
    T::decode_all(&mut &*b)
        .map_err(|e| ErrorKind::MalformedTx.err(format!("canonical decode failed: {e}")))
}

/// Appends `v` to `dst` as an unsigned LEB128 varint.
pub fn put_uvarint(dst: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        dst.push((v as u8) | 0x80);
        v >>= 7;
    }
    dst.push(v as u8);
}

/// Reads an unsigned LEB128 varint at `*pos`, advancing the position.
///
/// Returns [`ErrorKind::MalformedTx`] on truncation or a varint longer than
/// ten bytes.
pub fn take_uvarint(src: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let mut out: u64 = 0;
    let mut shift = 0u32;
    loop {
        let b = *src
            .get(*pos)
            .ok_or_else(|| ErrorKind::MalformedTx.err("bad varint"))?;
        *pos += 1;
        if shift == 63 && b > 1 {
            return Err(ErrorKind::MalformedTx.err("varint overflow"));
        }
        out |= u64::from(b & 0x7F) << shift;
        if b & 0x80 == 0 {
            return Ok(out);
        }
        shift += 7;
        if shift > 63 {
            return Err(ErrorKind::MalformedTx.err("varint overflow"));
        }
    }
}

/// Reads a big-endian u64 at `*pos`, advancing the position.
pub fn take_u64_be(src: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let end = pos
        .checked_add(8)
        .filter(|end| *end <= src.len())
        .ok_or_else(|| ErrorKind::MalformedTx.err("truncated u64"))?;
    let mut word = [0u8; 8];
    word.copy_from_slice(&src[*pos..end]);
    *pos = end;
    Ok(u64::from_be_bytes(word))
}
