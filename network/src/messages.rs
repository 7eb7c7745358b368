//! Typed payloads for the ten commands this peer implementation speaks.
//! Each type knows how to serialize itself and, where the peer needs to
//! receive it, how to parse one back out of a byte reader.

use std::io::Read;

use btc_core::block::BlockHeader;
use btc_core::bloom::BloomFilter;
use btc_core::codec::{read_varint, reversed, write_varint};
use btc_core::merkle::MerkleBlock;
use btc_core::tx::Tx;

use crate::envelope::Command;
use crate::error::{Error, Result};

/// A network address as carried in `version`: services bitfield, a 16-byte
/// (v4-mapped) IP, and a big-endian port.
#[derive(Debug, Clone)]
pub struct NetAddr {
    pub services: u64,
    pub ip: [u8; 4],
    pub port: u16,
}

impl NetAddr {
    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(26);
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&[0u8; 10]);
        out.extend_from_slice(&[0xff, 0xff]);
        out.extend_from_slice(&self.ip);
        out.extend_from_slice(&self.port.to_be_bytes());
        out
    }
}

/// `version`: the handshake's opening message.
#[derive(Debug, Clone)]
pub struct VersionMessage {
    pub protocol_version: u32,
    pub services: u64,
    pub timestamp: i64,
    pub recv_addr: NetAddr,
    pub from_addr: NetAddr,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: bool,
}

impl VersionMessage {
    /// A version message with no services advertised and a local-loopback
    /// peer address, matching what this library needs to announce itself
    /// as an SPV-only client.
    pub fn minimal(nonce: u64) -> Self {
        let addr = NetAddr {
            services: 0,
            ip: [0, 0, 0, 0],
            port: 8333,
        };
        VersionMessage {
            protocol_version: 70015,
            services: 0,
            timestamp: 0,
            recv_addr: addr.clone(),
            from_addr: addr,
            nonce,
            user_agent: "/btc-core:0.1/".to_string(),
            start_height: 0,
            relay: false,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(120);
        out.extend_from_slice(&self.protocol_version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.recv_addr.serialize());
        out.extend_from_slice(&self.from_addr.serialize());
        out.extend_from_slice(&self.nonce.to_le_bytes());

        let agent = self.user_agent.as_bytes();
        if agent.is_empty() {
            out.push(0x00);
        } else {
            out.extend_from_slice(&write_varint(agent.len() as u64));
            out.extend_from_slice(agent);
        }

        out.extend_from_slice(&self.start_height.to_le_bytes());
        out.push(self.relay as u8);
        out
    }
}

/// `getheaders`: one or more locator hashes plus an end hash (all zero for
/// "to the tip").
pub struct GetHeadersMessage {
    pub protocol_version: u32,
    pub start_blocks: Vec<[u8; 32]>,
    pub end_block: [u8; 32],
}

impl GetHeadersMessage {
    pub fn new(start_block: [u8; 32]) -> Self {
        GetHeadersMessage {
            protocol_version: 70015,
            start_blocks: vec![start_block],
            end_block: [0u8; 32],
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.protocol_version.to_le_bytes().to_vec();
        out.extend_from_slice(&write_varint(self.start_blocks.len() as u64));
        for hash in &self.start_blocks {
            out.extend_from_slice(&reversed(hash));
        }
        out.extend_from_slice(&reversed(&self.end_block));
        out
    }
}

/// `headers`: a list of block headers, each followed by a varint tx-count
/// that must be zero (this command only ever carries headers, no bodies).
pub struct HeadersMessage {
    pub headers: Vec<BlockHeader>,
}

impl HeadersMessage {
    pub fn parse(r: &mut impl Read) -> Result<Self> {
        let count = read_varint(r)?;
        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let header = BlockHeader::parse(r)?;
            let tx_count = read_varint(r)?;
            if tx_count != 0 {
                return Err(Error::HeadersTxsCount);
            }
            headers.push(header);
        }
        Ok(HeadersMessage { headers })
    }
}

/// `ping`/`pong`: an 8-byte nonce, echoed back verbatim.
#[derive(Debug, Clone, Copy)]
pub struct PingPong {
    pub nonce: [u8; 8],
}

impl PingPong {
    pub fn parse(r: &mut impl Read) -> Result<Self> {
        let mut nonce = [0u8; 8];
        r.read_exact(&mut nonce)?;
        Ok(PingPong { nonce })
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.nonce.to_vec()
    }
}

/// Item types carried in `getdata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvType {
    Tx = 1,
    Block = 2,
    FilteredBlock = 3,
}

/// `getdata`: a varint-prefixed list of `(type, hash)` inventory vectors.
pub struct GetDataMessage {
    pub items: Vec<(InvType, [u8; 32])>,
}

impl GetDataMessage {
    pub fn new(items: Vec<(InvType, [u8; 32])>) -> Self {
        GetDataMessage { items }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = write_varint(self.items.len() as u64);
        for (kind, hash) in &self.items {
            out.extend_from_slice(&(*kind as u32).to_le_bytes());
            out.extend_from_slice(&reversed(hash));
        }
        out
    }
}

/// `filterload`: builds the payload from a caller-supplied [`BloomFilter`].
pub fn filter_load_payload(filter: &BloomFilter, flag: u8) -> Vec<u8> {
    filter.filter_load_payload(flag)
}

/// `merkleblock` and `tx` carry their consensus-layer types directly;
/// parsing delegates to `btc_core`.
pub fn parse_merkle_block(r: &mut impl Read) -> Result<MerkleBlock> {
    Ok(MerkleBlock::parse(r)?)
}

pub fn parse_tx(r: &mut impl Read, testnet: bool) -> Result<Tx> {
    Ok(Tx::parse(r, testnet)?)
}

/// Pairs a [`Command`] with its serialized payload, for `Peer::send`.
pub struct OutgoingMessage {
    pub command: Command,
    pub payload: Vec<u8>,
}
