//! The 192-bit three-word identifier kept for legacy and composite keys.

use parity_scale_codec::{Decode, Encode};

use crate::error::Error;

use super::{base32, Uid};

/// A 192-bit identifier: three 64-bit words in big-endian significance.
///
/// Predates [`Uid`] and survives for composite keys (e.g. geo-tiled or
/// symbol-table keys) that need the extra word. The derived ordering is
/// lexicographic over the word triple.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct Uid3(pub [u64; 3]);

impl Uid3 {
    /// The nil value.
    pub const NIL: Uid3 = Uid3([0, 0, 0]);

    /// The greatest value.
    pub const MAX: Uid3 = Uid3([u64::MAX, u64::MAX, u64::MAX]);

    /// True when all words are zero.
    pub fn is_nil(&self) -> bool {
        self.0 == [0, 0, 0]
    }

    /// True when any word is non-zero.
    pub fn is_set(&self) -> bool {
        !self.is_nil()
    }

    /// 192-bit wrapping addition with carries across words.
    pub fn add(self, other: Uid3) -> Uid3 {
        let (w2, c2) = self.0[2].overflowing_add(other.0[2]);
        let (w1a, c1a) = self.0[1].overflowing_add(other.0[1]);
        let (w1, c1b) = w1a.overflowing_add(u64::from(c2));
        let w0 = self.0[0]
            .wrapping_add(other.0[0])
            .wrapping_add(u64::from(c1a | c1b));
        Uid3([w0, w1, w2])
    }

    /// 192-bit wrapping subtraction with borrows across words.
    pub fn subtract(self, other: Uid3) -> Uid3 {
        let (w2, b2) = self.0[2].overflowing_sub(other.0[2]);
        let (w1a, b1a) = self.0[1].overflowing_sub(other.0[1]);
        let (w1, b1b) = w1a.overflowing_sub(u64::from(b2));
        let w0 = self.0[0]
            .wrapping_sub(other.0[0])
            .wrapping_sub(u64::from(b1a | b1b));
        Uid3([w0, w1, w2])
    }

    /// Folds to the 128-bit form: `(w0 ^ w1, w2)`.
    pub fn fold(self) -> Uid {
        Uid([self.0[0] ^ self.0[1], self.0[2]])
    }

    /// The big-endian 24-byte form.
    pub fn to_bytes(self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[0..8].copy_from_slice(&self.0[0].to_be_bytes());
        out[8..16].copy_from_slice(&self.0[1].to_be_bytes());
        out[16..24].copy_from_slice(&self.0[2].to_be_bytes());
        out
    }

    /// Builds from up to 24 bytes, left-padding shorter input with zeros.
    pub fn from_bytes(input: &[u8]) -> Uid3 {
        let mut buf = [0u8; 24];
        let take = input.len().min(24);
        buf[24 - take..].copy_from_slice(&input[input.len() - take..]);
        let mut words = [0u64; 3];
        for (i, word) in words.iter_mut().enumerate() {
            let mut w = [0u8; 8];
            w.copy_from_slice(&buf[i * 8..i * 8 + 8]);
            *word = u64::from_be_bytes(w);
        }
        Uid3(words)
    }

    /// Canonic base32 form; see [`Uid::base32`].
    pub fn base32(&self) -> String {
        base32::encode(&self.0)
    }

    /// Lower-case base16 form, leading zeros stripped.
    pub fn base16(&self) -> String {
        base32::encode_base16(&self.0)
    }

    /// Parses base32 text (up to 39 digits), ignoring whitespace and `-`.
    pub fn parse_base32(text: &str) -> Result<Uid3, Error> {
        let mut words = [0u64; 3];
        base32::parse(text, &mut words)?;
        Ok(Uid3(words))
    }

    /// A short base32 suffix for logs and labels.
    pub fn label(&self) -> String {
        base32::suffix(self.0[2])
    }
}

impl std::fmt::Display for Uid3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base32())
    }
}

impl std::fmt::Debug for Uid3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Uid3({})", self.base32())
    }
}

impl From<Uid> for Uid3 {
    fn from(uid: Uid) -> Self {
        uid.widen()
    }
}
