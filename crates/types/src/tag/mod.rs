//! The identity algebra.
//!
//! A [`Uid`] is a fixed-width 128-bit value with four interpretations:
//!
//! * **timestamp** — [`Uid::from_unix`] maps a wall-clock instant onto the
//!   high bits; the mapping is injective for distinct `(seconds, nanos)`
//!   pairs and order-preserving.
//! * **hash** — [`Uid::hash_literal`] folds a Blake2s-256 digest to 128
//!   bits, so identical textual inputs produce identical IDs on independent
//!   clients.
//! * **arithmetic** — [`Uid::with`] is commutative and associative 128-bit
//!   addition, [`Uid::then`] its reversal, and [`Uid::midpoint`] the 128-bit
//!   mean. Together they let tag expressions combine order-independently.
//! * **reserved** — [`Uid::WILDCARD`] matches any value in a selector
//!   position; [`Uid::MAX`] is the greatest value.
//!
//! [`Uid3`] is the 192-bit three-word variant kept for legacy and composite
//! keys. [`Name`] pairs a [`Uid`] with the canonic string that produced it.

mod base32;
mod name;
mod uid3;

pub use base32::ALPHABET as BASE32_ALPHABET;
pub use name::{Expr, Name};
pub use uid3::Uid3;

use std::sync::{LazyLock, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use blake2::{Blake2s256, Digest};
use parity_scale_codec::{Decode, Encode};

use crate::error::{Error, ErrorKind};

/// One nanosecond expressed in 2^-64 second ticks: `⌊2^64 / 10^9⌋`.
pub const TICK_STEP: u64 = 0x44B8_2FA1_C;

/// Bits of word 1 beyond one-nanosecond resolution: 30 bits cover 10^9
/// nanoseconds and the low 16 bits are the fixed shift, leaving 50 bits.
pub const ENTROPY_BITS: u32 = 64 - 30 + 16;

/// Mask over the word-1 bits randomized by [`Uid::now`].
pub const ENTROPY_MASK: u64 = (1u64 << ENTROPY_BITS) - 1;

/// Low word-1 bits cleared by [`Uid::genesis_edit`] so a genesis edit UID is
/// recognizable at a glance.
pub const GENESIS_EDIT_CLEAR: u64 = 0xFFFF;

const P1: u64 = (1u64 << 63) - 471;
const P2: u64 = (1u64 << 62) - 143;
const ENTROPY_SALT: u64 = 0xCCCC_AAAA_CCCC_AAAA;

/// A 128-bit universal identifier: two 64-bit words in big-endian
/// significance (`words[0]` is most significant).
///
/// The derived ordering is the canonical UID ordering: lexicographic over
/// the word pair, which for timestamp UIDs is chronological.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct Uid(pub [u64; 2]);

impl Uid {
    /// The nil UID.
    pub const NIL: Uid = Uid([0, 0]);

    /// The greatest UID.
    pub const MAX: Uid = Uid([u64::MAX, u64::MAX]);

    /// The reserved wildcard: matches any UID in a selector position.
    pub const WILDCARD: Uid = Uid([u64::MAX, u64::MAX - 1]);

    /// True when both words are zero.
    pub fn is_nil(&self) -> bool {
        self.0[0] == 0 && self.0[1] == 0
    }

    /// True when any word is non-zero.
    pub fn is_set(&self) -> bool {
        !self.is_nil()
    }

    /// True when this is the reserved wildcard.
    pub fn is_wildcard(&self) -> bool {
        *self == Self::WILDCARD
    }

    /// Commutative, associative combination: 128-bit wrapping addition.
    ///
    /// Because addition commutes, tag literals combined through `with` are
    /// order independent, and `a.with(b).then(b) == a`.
    pub fn with(self, other: Uid) -> Uid {
        let (w1, carry) = self.0[1].overflowing_add(other.0[1]);
        let w0 = self.0[0]
            .wrapping_add(other.0[0])
            .wrapping_add(u64::from(carry));
        Uid([w0, w1])
    }

    /// Non-commutative combination: 128-bit wrapping subtraction, the exact
    /// reversal of [`Uid::with`].
    pub fn then(self, other: Uid) -> Uid {
        let (w1, borrow) = self.0[1].overflowing_sub(other.0[1]);
        let w0 = self.0[0]
            .wrapping_sub(other.0[0])
            .wrapping_sub(u64::from(borrow));
        Uid([w0, w1])
    }

    /// The 128-bit arithmetic mean of two UIDs, rounded toward zero.
    /// Symmetric: `a.midpoint(b) == b.midpoint(a)`; `a.midpoint(a) == a`.
    pub fn midpoint(self, other: Uid) -> Uid {
        let (w1, c1) = self.0[1].overflowing_add(other.0[1]);
        let (w0a, c2) = self.0[0].overflowing_add(other.0[0]);
        let (w0, c3) = w0a.overflowing_add(u64::from(c1));
        let carry = u64::from(c2 | c3);
        Uid([(w0 >> 1) | (carry << 63), (w1 >> 1) | ((w0 & 1) << 63)])
    }

    /// Combines with the hash of a tag expression; see [`Name`].
    pub fn with_expr(self, expr: &str) -> Uid {
        self.with(Uid::from_expr(expr))
    }

    /// Combines with the hash of a single token, bypassing canonicalization.
    pub fn with_token(self, token: &str) -> Uid {
        self.with(Uid::hash_literal(token.as_bytes()))
    }

    /// The UID of a full tag expression: `Name::default().with(expr).id`.
    pub fn from_expr(expr: &str) -> Uid {
        Name::default().with(expr).id
    }

    /// Hashes a byte literal to a UID.
    ///
    /// Empty input is hardwired to the nil UID; anything else is the
    /// Blake2s-256 digest folded to 128 bits by XOR of its two halves.
    pub fn hash_literal(literal: &[u8]) -> Uid {
        if literal.is_empty() {
            return Uid::NIL;
        }
        let digest = Blake2s256::digest(literal);
        let mut folded = [0u8; 16];
        for (i, b) in folded.iter_mut().enumerate() {
            *b = digest[i] ^ digest[i + 16];
        }
        Uid::from_bytes(folded)
    }

    /// Maps a wall-clock instant to a UID: the high 48 bits of word 0 are
    /// whole unix seconds, the remaining 80 bits the fractional second
    /// spread over 2^-64 ticks. Injective for distinct `(secs, nanos)`.
    pub fn from_unix(unix_secs: i64, nanos: u32) -> Uid {
        let ns_f64 = u64::from(nanos).wrapping_mul(TICK_STEP);
        Uid([
            ((unix_secs as u64) << 16) | (ns_f64 >> 48),
            ns_f64 << 16,
        ])
    }

    /// Maps a [`SystemTime`] through [`Uid::from_unix`].
    pub fn from_time(t: SystemTime) -> Uid {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Uid::from_unix(d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                // pre-1970 instants carry negative whole seconds
                let d = e.duration();
                let mut secs = -(d.as_secs() as i64);
                let mut nanos = d.subsec_nanos();
                if nanos > 0 {
                    secs -= 1;
                    nanos = 1_000_000_000 - nanos;
                }
                Uid::from_unix(secs, nanos)
            }
        }
    }

    /// The current instant as a UID, statistically unique even in rapid
    /// succession: the low [`ENTROPY_BITS`] of word 1 are XOR-folded with a
    /// process-global entropy state, and serial calls are clamped strictly
    /// monotone even across threads (single-writer behind a mutex).
    pub fn now() -> Uid {
        let mut uid = Uid::from_time(SystemTime::now());
        let mut clock = CLOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mixed = P1
            .wrapping_mul(uid.0[1])
            .wrapping_add(ENTROPY_SALT)
            ^ P2.wrapping_mul(clock.entropy);
        clock.entropy = mixed;
        uid.0[1] ^= mixed & ENTROPY_MASK;
        if uid <= clock.last {
            uid = clock.last.with(Uid([0, 1]));
        }
        clock.last = uid;
        uid
    }

    /// A fresh edit UID marking the first revision of an element: the low
    /// word-1 bits are cleared so genesis edits are recognizable.
    pub fn genesis_edit() -> Uid {
        let mut id = Uid::now();
        id.0[1] &= !GENESIS_EDIT_CLEAR;
        id
    }

    /// Recovers the whole unix seconds of a timestamp UID.
    pub fn unix_secs(&self) -> i64 {
        (self.0[0] as i64) >> 16
    }

    /// Recovers the `(seconds, nanos)` pair of a timestamp UID.
    pub fn as_unix(&self) -> (i64, u32) {
        let ns_f64 = ((self.0[0] & 0xFFFF) << 48) | (self.0[1] >> 16);
        let nanos = 1 + ns_f64 / (1 + TICK_STEP);
        (self.unix_secs(), nanos as u32)
    }

    /// The big-endian 16-byte form.
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&self.0[0].to_be_bytes());
        out[8..16].copy_from_slice(&self.0[1].to_be_bytes());
        out
    }

    /// Inverse of [`Uid::to_bytes`].
    pub fn from_bytes(b: [u8; 16]) -> Uid {
        let mut w0 = [0u8; 8];
        let mut w1 = [0u8; 8];
        w0.copy_from_slice(&b[0..8]);
        w1.copy_from_slice(&b[8..16]);
        Uid([u64::from_be_bytes(w0), u64::from_be_bytes(w1)])
    }

    /// Canonic base32 form: leading zeros stripped, nil renders `"0"`.
    pub fn base32(&self) -> String {
        base32::encode(&self.0)
    }

    /// Parses a base32 UID, ignoring whitespace and `-`.
    ///
    /// Rejects unknown glyphs and input longer than 26 digits.
    pub fn parse_base32(text: &str) -> Result<Uid, Error> {
        let mut words = [0u64; 2];
        base32::parse(text, &mut words)?;
        Ok(Uid(words))
    }

    /// Lower-case base16 form, leading zeros stripped.
    pub fn base16(&self) -> String {
        base32::encode_base16(&self.0)
    }

    /// A short base32 suffix for logs and labels.
    pub fn label(&self) -> String {
        base32::suffix(self.0[1])
    }

    /// Widens to the three-word form with a zero high word.
    pub fn widen(self) -> Uid3 {
        Uid3([0, self.0[0], self.0[1]])
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base32())
    }
}

impl std::fmt::Debug for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Uid({})", self.base32())
    }
}

struct Clock {
    entropy: u64,
    last: Uid,
}

static CLOCK: LazyLock<Mutex<Clock>> = LazyLock::new(|| {
    Mutex::new(Clock {
        entropy: ((1u64 << 63) - 301) ^ rand::random::<u64>(),
        last: Uid::NIL,
    })
});

/// Parse error raised for text that is not a recognizable ID.
pub(crate) fn unrecognized_format() -> Error {
    ErrorKind::BadRequest.err("unrecognized ID format")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_then_roundtrip() {
        let a = Uid([0x1234_5678_9ABC_DEF0, 0xFFFF_FFFF_FFFF_FFFE]);
        let b = Uid([3, u64::MAX - 1]);
        assert_eq!(a.with(b), b.with(a));
        assert_eq!(a.with(b).then(b), a);
    }

    #[test]
    fn with_carries_across_words() {
        let a = Uid([0, u64::MAX]);
        let b = Uid([0, 1]);
        assert_eq!(a.with(b), Uid([1, 0]));
        assert_eq!(Uid([1, 0]).then(b), a);
    }

    #[test]
    fn midpoint_basics() {
        let a = Uid([0, 10]);
        let b = Uid([0, 20]);
        assert_eq!(a.midpoint(b), Uid([0, 15]));
        assert_eq!(a.midpoint(b), b.midpoint(a));
        assert_eq!(a.midpoint(a), a);

        // mean crosses the word boundary
        let hi = Uid([1, 0]);
        let lo = Uid([0, 0]);
        assert_eq!(hi.midpoint(lo), Uid([0, 1u64 << 63]));
    }

    #[test]
    fn hash_literal_nil_on_empty() {
        assert_eq!(Uid::hash_literal(b""), Uid::NIL);
        assert!(Uid::hash_literal(b"a").is_set());
        assert_ne!(Uid::hash_literal(b"a"), Uid::hash_literal(b"b"));
    }

    #[test]
    fn time_roundtrip() {
        let uid = Uid::from_unix(1234, 567);
        assert_eq!(uid.as_unix(), (1234, 567));
        assert_eq!(uid.unix_secs(), 1234);
    }

    #[test]
    fn time_is_ordered_and_injective() {
        let a = Uid::from_unix(1000, 0);
        let b = Uid::from_unix(1000, 1);
        let c = Uid::from_unix(1001, 0);
        assert!(a < b && b < c);
    }

    #[test]
    fn now_is_strictly_monotone() {
        let mut prev = Uid::now();
        for _ in 0..10_000 {
            let next = Uid::now();
            assert!(next > prev, "{next:?} !> {prev:?}");
            prev = next;
        }
    }

    #[test]
    fn now_entropy_stays_within_epsilon() {
        // no recent value may exceed the newest reading plus the entropy
        // window
        let epsilon = Uid([0, ENTROPY_MASK]);
        let mut recent = [Uid::NIL; 64];
        for slot in recent.iter_mut() {
            *slot = Uid::now();
        }
        for i in 0..10_000 {
            let now = Uid::now();
            let upper = now.with(epsilon);
            for prev in &recent {
                assert!(*prev < upper, "{prev:?} >= {upper:?}");
            }
            recent[i & 63] = now;
        }
    }

    #[test]
    fn bytes_roundtrip() {
        let uid = Uid([0x0102_0304_0506_0708, 0x090A_0B0C_0D0E_0F10]);
        assert_eq!(Uid::from_bytes(uid.to_bytes()), uid);
        assert_eq!(uid.to_bytes()[0], 0x01);
        assert_eq!(uid.to_bytes()[15], 0x10);
    }

    #[test]
    fn wildcard_is_not_max() {
        assert!(Uid::WILDCARD < Uid::MAX);
        assert!(Uid::WILDCARD.is_wildcard());
        assert!(!Uid::MAX.is_wildcard());
    }
}
