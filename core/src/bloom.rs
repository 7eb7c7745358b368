//! BIP37 connection Bloom filter: a salted-Murmur3 bit field used to ask a
//! peer to relay only transactions touching a set of items of interest.
//!
//! `add` is **not** thread-safe; build the whole filter on one executor
//! before calling [`BloomFilter::filter_load_payload`].

use std::io::Cursor;

use crate::codec::write_varint;

const BIP37_CONSTANT: u32 = 0xfba4c795;

pub struct BloomFilter {
    size: u32,
    function_count: u32,
    tweak: u32,
    bit_field: Vec<u8>,
}

impl BloomFilter {
    /// `size` is the filter size in bytes; the bit field has `size * 8`
    /// bits.
    pub fn new(size: u32, function_count: u32, tweak: u32) -> Self {
        Self {
            size,
            function_count,
            tweak,
            bit_field: vec![0u8; (size as usize) * 8],
        }
    }

    /// Sets, for each of `function_count` seeded Murmur3 hashes of `item`,
    /// the corresponding bit in the field.
    pub fn add(&mut self, item: &[u8]) {
        let field_bits = self.bit_field.len() as u32;
        for i in 0..self.function_count {
            let seed = i.wrapping_mul(BIP37_CONSTANT).wrapping_add(self.tweak);
            let mut cursor = Cursor::new(item);
            let hash = murmur3::murmur3_32(&mut cursor, seed).expect("hashing an in-memory slice cannot fail");
            self.bit_field[(hash % field_bits) as usize] = 1;
        }
    }

    /// Packs the one-bit-per-byte internal field into LSB-first bytes: bit
    /// `k` sets bit `k mod 8` of byte `k / 8`.
    pub fn filter_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.size as usize];
        for (k, &bit) in self.bit_field.iter().enumerate() {
            if bit != 0 {
                out[k / 8] |= 1 << (k % 8);
            }
        }
        out
    }

    /// Builds the `filterload` payload: `varint(size) | filter_bytes |
    /// function_count(LE4) | tweak(LE4) | flag(LE1)`.
    pub fn filter_load_payload(&self, flag: u8) -> Vec<u8> {
        let mut out = write_varint(self.size as u64);
        out.extend_from_slice(&self.filter_bytes());
        out.extend_from_slice(&self.function_count.to_le_bytes());
        out.extend_from_slice(&self.tweak.to_le_bytes());
        out.push(flag);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_world_goodbye_fixture_matches_spec() {
        let mut filter = BloomFilter::new(10, 5, 99);
        filter.add(b"Hello World");
        filter.add(b"Goodbye!");

        assert_eq!(hex::encode(filter.filter_bytes()), "4000600a080000010940");

        let payload = filter.filter_load_payload(1);
        assert_eq!(hex::encode(payload), "0a4000600a080000010940050000006300000001");
    }
}
