//! Merkle root computation and BIP37 partial Merkle tree (`MerkleBlock`)
//! reconstruction.

use std::io::Read;

use crate::codec::{self, read_exact, read_varint};
use crate::error::{Error, Result};

/// `HASH256(hash1 || hash2)`.
pub fn merkle_parent(hash1: &[u8], hash2: &[u8]) -> [u8; 32] {
    let mut combined = Vec::with_capacity(hash1.len() + hash2.len());
    combined.extend_from_slice(hash1);
    combined.extend_from_slice(hash2);
    codec::hash256(&combined)
}

/// Pairs adjacent hashes into parents; an odd trailing hash is paired with
/// itself.
pub fn merkle_parent_level(hashes: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut level = Vec::with_capacity(hashes.len().div_ceil(2));
    let mut i = 0;
    while i + 1 < hashes.len() {
        level.push(merkle_parent(&hashes[i], &hashes[i + 1]));
        i += 2;
    }
    if hashes.len() % 2 == 1 {
        let last = hashes.last().unwrap();
        level.push(merkle_parent(last, last));
    }
    level
}

/// Recursively reduces `hashes` to a single root via [`merkle_parent_level`].
pub fn merkle_root(hashes: &[[u8; 32]]) -> [u8; 32] {
    if hashes.len() == 1 {
        return hashes[0];
    }
    merkle_root(&merkle_parent_level(hashes))
}

/// The depth-first navigation state used to reconstruct a tree's root from
/// a partial set of hashes plus a flag-bit stream (BIP37).
struct MerkleTree {
    tree: Vec<Vec<Option<[u8; 32]>>>,
    max_depth: usize,
    current_depth: usize,
    current_index: usize,
}

impl MerkleTree {
    fn new(num_leaves: u32) -> Self {
        let max_depth = (num_leaves as f64).log2().ceil() as usize;
        let mut tree = Vec::with_capacity(max_depth + 1);
        for depth in 0..=max_depth {
            let leaves_at_depth = leaves_at_depth(num_leaves, max_depth, depth);
            tree.push(vec![None; leaves_at_depth]);
        }
        MerkleTree {
            tree,
            max_depth,
            current_depth: 0,
            current_index: 0,
        }
    }

    fn up(&mut self) {
        // A single-leaf tree has max_depth 0: the root is also the only
        // leaf, and populate() stops as soon as it's set. Guard against the
        // resulting underflow rather than moving to a nonexistent parent.
        if self.current_depth == 0 {
            return;
        }
        self.current_depth -= 1;
        self.current_index /= 2;
    }

    fn left(&mut self) {
        self.current_depth += 1;
        self.current_index *= 2;
    }

    fn right(&mut self) {
        self.current_depth += 1;
        self.current_index = self.current_index * 2 + 1;
    }

    fn set_current(&mut self, hash: [u8; 32]) {
        self.tree[self.current_depth][self.current_index] = Some(hash);
    }

    fn left_node(&self) -> Option<[u8; 32]> {
        self.tree[self.current_depth + 1][self.current_index * 2]
    }

    fn right_node(&self) -> Option<[u8; 32]> {
        self.tree[self.current_depth + 1][self.current_index * 2 + 1]
    }

    fn right_exists(&self) -> bool {
        if self.is_leaf() {
            return false;
        }
        self.tree[self.current_depth + 1].len() > self.current_index * 2 + 1
    }

    fn is_leaf(&self) -> bool {
        self.current_depth == self.max_depth
    }

    fn root(&self) -> Option<[u8; 32]> {
        self.tree[0][0]
    }

    /// Walks the tree depth-first, consuming `flag_bits` at branch points
    /// and `hashes` at leaves and flagged-off subtrees, until the root is
    /// set.
    fn populate(&mut self, flag_bits: &[u8], hashes: &[[u8; 32]]) -> Result<()> {
        let mut bit_pos = 0;
        let mut hash_pos = 0;

        while self.root().is_none() {
            if self.is_leaf() {
                self.set_current(*hashes.get(hash_pos).ok_or(Error::HashesNotConsumed)?);
                hash_pos += 1;
                bit_pos += 1;
                self.up();
                continue;
            }

            match self.left_node() {
                None => {
                    let flag = *flag_bits.get(bit_pos).ok_or(Error::FlagBitsNotConsumed)?;
                    bit_pos += 1;
                    if flag == 0 {
                        self.set_current(*hashes.get(hash_pos).ok_or(Error::HashesNotConsumed)?);
                        hash_pos += 1;
                        self.up();
                    } else {
                        self.left();
                    }
                }
                Some(left_hash) => {
                    if self.right_exists() {
                        match self.right_node() {
                            None => self.right(),
                            Some(right_hash) => {
                                self.set_current(merkle_parent(&left_hash, &right_hash));
                                self.up();
                            }
                        }
                    } else {
                        self.set_current(merkle_parent(&left_hash, &left_hash));
                        self.up();
                    }
                }
            }
        }

        if hash_pos != hashes.len() {
            return Err(Error::HashesNotConsumed);
        }
        if flag_bits.get(bit_pos..).is_some_and(|rest| rest.iter().any(|&b| b != 0)) {
            return Err(Error::FlagBitsNotConsumed);
        }

        Ok(())
    }
}

fn leaves_at_depth(total: u32, max_depth: usize, depth: usize) -> usize {
    let divisor = 1u64 << (max_depth - depth);
    ((total as f64) / (divisor as f64)).ceil() as usize
}

/// Unpacks a byte slice into one `bool`-as-`u8` per bit, LSB-first within
/// each byte (bit `k` reads bit `k mod 8` of byte `k / 8`).
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in 0..8 {
            bits.push((byte >> i) & 1);
        }
    }
    bits
}

/// A BIP37 filtered block: the header fields plus the partial set of
/// transaction hashes and flag bits needed to reconstruct the Merkle root.
#[derive(Debug, Clone)]
pub struct MerkleBlock {
    pub version: u32,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: [u8; 4],
    pub nonce: [u8; 4],
    pub tx_count: u32,
    pub hashes: Vec<[u8; 32]>,
    pub flags: Vec<u8>,
}

impl MerkleBlock {
    pub fn parse(r: &mut impl Read) -> Result<Self> {
        let version = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());

        let mut prev_block: [u8; 32] = read_exact(r, 32)?.try_into().unwrap();
        prev_block.reverse();

        let mut merkle_root: [u8; 32] = read_exact(r, 32)?.try_into().unwrap();
        merkle_root.reverse();

        let timestamp = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());
        let bits: [u8; 4] = read_exact(r, 4)?.try_into().unwrap();
        let nonce: [u8; 4] = read_exact(r, 4)?.try_into().unwrap();
        let tx_count = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());

        let hashes_count = read_varint(r)?;
        let mut hashes = Vec::with_capacity(hashes_count as usize);
        for _ in 0..hashes_count {
            let mut hash: [u8; 32] = read_exact(r, 32)?.try_into().unwrap();
            hash.reverse();
            hashes.push(hash);
        }

        let flags_count = read_varint(r)?;
        let flags = read_exact(r, flags_count as usize)?;

        Ok(MerkleBlock {
            version,
            prev_block,
            merkle_root,
            timestamp,
            bits,
            nonce,
            tx_count,
            hashes,
            flags,
        })
    }

    /// Reconstructs the root from `hashes`/`flags` and compares it (after
    /// reversing back to wire order) against `merkle_root`.
    pub fn is_valid(&self) -> Result<bool> {
        let mut tree = MerkleTree::new(self.tx_count);
        let reversed_hashes: Vec<[u8; 32]> = self
            .hashes
            .iter()
            .map(|h| {
                let mut r = *h;
                r.reverse();
                r
            })
            .collect();

        let flag_bits = bytes_to_bits(&self.flags);
        tree.populate(&flag_bits, &reversed_hashes)?;

        let Some(mut root) = tree.root() else {
            return Ok(false);
        };
        root.reverse();
        Ok(root == self.merkle_root)
    }
}
