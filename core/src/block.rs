//! Block headers: fixed 80-byte (de)serialization, proof-of-work checking,
//! target/bits compaction, difficulty, and next-epoch retargeting.

use std::io::Read;

use num_bigint::{BigInt, Sign};
use num_traits::Zero;

use crate::codec::{self, read_exact};
use crate::error::Result;

const TWO_WEEKS: i64 = 60 * 60 * 24 * 14;

/// A Bitcoin block header. `prev_block`, `merkle_root`, `bits`, and `nonce`
/// are stored in display order (the same order they print as hex), not the
/// order they're serialized in on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: [u8; 4],
    pub nonce: [u8; 4],
}

impl BlockHeader {
    pub fn parse(r: &mut impl Read) -> Result<Self> {
        let version = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());

        let mut prev_block: [u8; 32] = read_exact(r, 32)?.try_into().unwrap();
        prev_block.reverse();

        let mut merkle_root: [u8; 32] = read_exact(r, 32)?.try_into().unwrap();
        merkle_root.reverse();

        let timestamp = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());
        let bits: [u8; 4] = read_exact(r, 4)?.try_into().unwrap();
        let nonce: [u8; 4] = read_exact(r, 4)?.try_into().unwrap();

        Ok(BlockHeader {
            version,
            prev_block,
            merkle_root,
            timestamp,
            bits,
            nonce,
        })
    }

    /// Fixed 80-byte wire serialization: `prev_block` and `merkle_root` are
    /// byte-reversed back to wire order.
    pub fn serialize(&self) -> [u8; 80] {
        let mut out = [0u8; 80];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(&codec::reversed(&self.prev_block));
        out[36..68].copy_from_slice(&codec::reversed(&self.merkle_root));
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits);
        out[76..80].copy_from_slice(&self.nonce);
        out
    }

    /// `HASH256` of the serialized header, reversed to display order.
    pub fn hash(&self) -> [u8; 32] {
        let digest = codec::hash256(&self.serialize());
        let mut out = digest;
        out.reverse();
        out
    }

    /// `true` iff the top 3 bits of `version` are `0b001` (BIP9 signaling).
    pub fn bip9(&self) -> bool {
        self.version >> 29 == 1
    }

    pub fn target(&self) -> BigInt {
        bits_to_target(&self.bits)
    }

    /// `(0xFFFF * 256^26) / target`.
    pub fn difficulty(&self) -> BigInt {
        let numerator = BigInt::from(0xFFFFu32) * BigInt::from(256u32).pow(26);
        numerator / self.target()
    }

    /// `true` iff `HASH256(header)`, read little-endian as an integer, is
    /// strictly below `target()`.
    pub fn check_pow(&self) -> bool {
        let digest = codec::hash256(&self.serialize());
        let mut le = digest.to_vec();
        le.reverse();
        let proof = BigInt::from_bytes_be(Sign::Plus, &le);
        proof < self.target()
    }
}

/// `target = coefficient * 256^(exponent - 3)`, where `bits` is
/// `coefficient(3 bytes LE) | exponent(1 byte)`.
pub fn bits_to_target(bits: &[u8; 4]) -> BigInt {
    let exponent = bits[3] as i64;
    let coefficient = BigInt::from_bytes_le(Sign::Plus, &bits[0..3]);
    coefficient * BigInt::from(256u32).pow((exponent - 3).unsigned_abs() as u32) // exponent >= 3 in practice
}

/// Inverse of [`bits_to_target`]. Strips leading zero bytes from the
/// big-endian target; if the most significant remaining byte would be
/// interpreted as negative (`>= 0x7F`), prepends a zero byte and bumps the
/// exponent so the coefficient's top bit never looks like a sign bit.
pub fn target_to_bits(target: &BigInt) -> [u8; 4] {
    let (_, mut be) = target.to_bytes_be();
    while be.first() == Some(&0) {
        be.remove(0);
    }

    if be.first().copied().unwrap_or(0) >= 0x7f {
        be.insert(0, 0);
    }

    let exponent = be.len() as u8;
    let mut coefficient = if be.len() >= 3 {
        be[0..3].to_vec()
    } else {
        let mut padded = be.clone();
        padded.resize(3, 0);
        padded
    };
    coefficient.reverse();

    [coefficient[0], coefficient[1], coefficient[2], exponent]
}

/// Computes new `bits` for the epoch boundary: clamps `time_diff` (seconds
/// between the last and first block of the 2016-block epoch) to
/// `[TWO_WEEKS/4, TWO_WEEKS*4]`, then scales the previous target by the
/// clamped ratio.
pub fn next_bits(prev_bits: &[u8; 4], time_diff: i64) -> [u8; 4] {
    let clamped = time_diff.clamp(TWO_WEEKS / 4, TWO_WEEKS * 4);
    let prev_target = bits_to_target(prev_bits);
    let new_target = (prev_target * BigInt::from(clamped)) / BigInt::from(TWO_WEEKS);
    let new_target = if new_target.is_zero() { BigInt::from(1) } else { new_target };
    target_to_bits(&new_target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bits() -> [u8; 4] {
        // e93c0118 little-endian on the wire
        [0xe9, 0x3c, 0x01, 0x18]
    }

    #[test]
    fn bits_to_target_matches_known_value() {
        let target = bits_to_target(&sample_bits());
        assert_eq!(
            target.to_string(),
            "30353962581764818649842367179120467226026534727449575424"
        );
    }

    #[test]
    fn difficulty_matches_known_value() {
        let header = BlockHeader {
            version: 1,
            prev_block: [0; 32],
            merkle_root: [0; 32],
            timestamp: 0,
            bits: sample_bits(),
            nonce: [0; 4],
        };
        assert_eq!(header.difficulty().to_string(), "888171856257");
    }

    #[test]
    fn bits_target_round_trip_within_precision() {
        let target = bits_to_target(&sample_bits());
        let bits = target_to_bits(&target);
        assert_eq!(bits_to_target(&bits), target);
    }

    #[test]
    fn next_bits_matches_known_value() {
        let prev_bits = [0x54, 0xd8, 0x01, 0x18];
        let bits = next_bits(&prev_bits, 302_400);
        assert_eq!(hex::encode(bits), "00157617");
    }

    #[test]
    fn next_bits_clamp_keeps_ratio_within_quarter_to_quadruple() {
        let prev_bits = sample_bits();
        let prev_target = bits_to_target(&prev_bits);
        for time_diff in [1i64, TWO_WEEKS / 8, TWO_WEEKS, 8 * TWO_WEEKS, 10 * TWO_WEEKS] {
            let bits = next_bits(&prev_bits, time_diff);
            let new_target = bits_to_target(&bits);
            let ratio_num = new_target.clone() * BigInt::from(4);
            let ratio_den = prev_target.clone();
            assert!(ratio_num >= ratio_den, "new target too small for {time_diff}");
            let ratio_num2 = new_target * BigInt::from(1);
            let ratio_den2 = prev_target.clone() * BigInt::from(4);
            assert!(ratio_num2 <= ratio_den2, "new target too large for {time_diff}");
        }
    }

    #[test]
    fn bip9_checks_top_three_version_bits() {
        let mut header = BlockHeader {
            version: 0b001 << 29,
            prev_block: [0; 32],
            merkle_root: [0; 32],
            timestamp: 0,
            bits: sample_bits(),
            nonce: [0; 4],
        };
        assert!(header.bip9());
        header.version = 0;
        assert!(!header.bip9());
    }
}
